use anyhow::{anyhow, Result};
use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::FluentResource;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::error;
use unic_langid::LanguageIdentifier;

type Bundle = FluentBundle<FluentResource>;

const DEFAULT_LANGUAGE: &str = "en";

/// Bundled translations, keyed by language
const RESOURCES: [(&str, &str); 2] = [
    ("en", include_str!("../locales/en/main.ftl")),
    ("ru", include_str!("../locales/ru/main.ftl")),
];

/// Localization manager for the rental assistant bot
pub struct LocalizationManager {
    bundles: HashMap<&'static str, Bundle>,
}

impl LocalizationManager {
    /// Build a bundle for every bundled language
    pub fn new() -> Result<Self> {
        let mut bundles = HashMap::new();
        for (language, source) in RESOURCES {
            bundles.insert(language, Self::create_bundle(language, source)?);
        }
        Ok(Self { bundles })
    }

    fn create_bundle(language: &str, source: &str) -> Result<Bundle> {
        let locale: LanguageIdentifier = language.parse()?;
        let mut bundle = FluentBundle::new_concurrent(vec![locale]);
        // Telegram renders the bidi isolation marks literally
        bundle.set_use_isolating(false);

        let resource = FluentResource::try_new(source.to_string())
            .map_err(|(_, errors)| anyhow!("Invalid {language} translations: {errors:?}"))?;
        bundle
            .add_resource(resource)
            .map_err(|errors| anyhow!("Duplicate {language} translations: {errors:?}"))?;
        Ok(bundle)
    }

    fn empty() -> Self {
        Self {
            bundles: HashMap::new(),
        }
    }

    /// Whether translations exist for the primary subtag of `language_code`
    pub fn supports(&self, language_code: &str) -> bool {
        self.bundles.contains_key(primary_subtag(language_code))
    }

    /// Get a localized message, falling back to English
    pub fn get_message(&self, key: &str, language_code: Option<&str>) -> String {
        let preferred = language_code.map(primary_subtag).unwrap_or(DEFAULT_LANGUAGE);

        [preferred, DEFAULT_LANGUAGE]
            .into_iter()
            .find_map(|language| self.format(language, key))
            .unwrap_or_else(|| format!("Missing translation: {key}"))
    }

    fn format(&self, language: &str, key: &str) -> Option<String> {
        let bundle = self.bundles.get(language)?;
        let pattern = bundle.get_message(key)?.value()?;
        let mut errors = vec![];
        let value = bundle.format_pattern(pattern, None, &mut errors);
        Some(value.into_owned())
    }

    /// Whether `text` is the translation of `key` in any language
    pub fn matches_any(&self, key: &str, text: &str) -> bool {
        self.bundles
            .keys()
            .any(|language| self.format(language, key).as_deref() == Some(text))
    }
}

/// "ru-RU" → "ru"
fn primary_subtag(language_code: &str) -> &str {
    language_code
        .split(['-', '_'])
        .next()
        .unwrap_or(language_code)
}

static LOCALIZATION_MANAGER: OnceLock<LocalizationManager> = OnceLock::new();

/// Initialize the global localization manager
pub fn init_localization() -> Result<()> {
    if LOCALIZATION_MANAGER.get().is_none() {
        let manager = LocalizationManager::new()?;
        let _ = LOCALIZATION_MANAGER.set(manager);
    }
    Ok(())
}

/// Get the global localization manager, initializing it on first use
pub fn get_localization_manager() -> &'static LocalizationManager {
    LOCALIZATION_MANAGER.get_or_init(|| {
        LocalizationManager::new().unwrap_or_else(|e| {
            error!(error = %e, "Failed to load translations");
            LocalizationManager::empty()
        })
    })
}

/// Localized message for a Telegram language code
pub fn t_lang(key: &str, language_code: Option<&str>) -> String {
    get_localization_manager().get_message(key, language_code)
}
