//! # Field Encoders Module
//!
//! Fixed lookup tables that turn the categorical attributes of a rental ad
//! into numeric codes. Every encoder is total: a value missing from its table
//! (or no value at all) encodes to the sentinel `0.0`.

use lazy_static::lazy_static;
use std::collections::{HashMap, HashSet};
use std::sync::Once;
use tracing::warn;

/// Sentinel code for "no information"
pub const UNKNOWN_CODE: f64 = 0.0;

/// Hand-maintained mapping from category names to numeric codes
#[derive(Debug, Clone)]
pub struct CategoryTable {
    name: &'static str,
    codes: HashMap<&'static str, f64>,
    duplicates: Vec<&'static str>,
}

impl CategoryTable {
    /// Build a table from `(name, code)` entries.
    ///
    /// Entries are applied in order, so a name defined twice keeps the code
    /// of its last definition. Repeated names are remembered and can be
    /// inspected with [`CategoryTable::duplicate_keys`].
    pub fn new(name: &'static str, entries: &[(&'static str, f64)]) -> Self {
        let mut codes = HashMap::with_capacity(entries.len());
        let mut seen = HashSet::with_capacity(entries.len());
        let mut duplicates = Vec::new();

        for &(key, code) in entries {
            if !seen.insert(key) && !duplicates.contains(&key) {
                duplicates.push(key);
            }
            codes.insert(key, code);
        }

        Self {
            name,
            codes,
            duplicates,
        }
    }

    /// Table name used in log output
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Look up a category, returning `None` when it is not in the table.
    ///
    /// Unlike [`CategoryTable::encode`] this tells apart an unknown value
    /// from one that is legitimately coded as `0`.
    pub fn lookup(&self, value: &str) -> Option<f64> {
        self.codes.get(value.trim()).copied()
    }

    /// Encode a category, falling back to [`UNKNOWN_CODE`]
    pub fn encode(&self, value: Option<&str>) -> f64 {
        value
            .and_then(|v| self.lookup(v))
            .unwrap_or(UNKNOWN_CODE)
    }

    /// Names that were defined more than once, in first-repeat order
    pub fn duplicate_keys(&self) -> &[&'static str] {
        &self.duplicates
    }
}

const METRO_STATIONS: &[(&str, f64)] = &[
    ("Aeroport", 1.0),
    ("Akademicheskaya", 2.0),
    ("Aleksandrovsky Sad", 3.0),
    ("Alma-Atinskaya", 4.0),
    ("Altufyevo", 5.0),
    ("Arbatskaya", 6.0),
    ("Aviamotornaya", 7.0),
    ("Babushkinskaya", 8.0),
    ("Bagrationovskaya", 9.0),
    ("Belyayevo", 10.0),
    ("Belorusskaya", 11.0),
    ("Bibirevo", 12.0),
    ("Borisovo", 13.0),
    ("Borovitskaya", 14.0),
    ("Botanichesky Sad", 15.0),
    ("Bratislavskaya", 16.0),
    ("Bulvar Admirala Ushakova", 17.0),
    ("Bulvar Dmitriya Donskogo", 18.0),
    ("Butyrskaya", 19.0),
    ("Chertanovskaya", 20.0),
    ("Chekhovskaya", 21.0),
    ("Chistye Prudy", 22.0),
    ("Chkalovskaya", 23.0),
    ("Dmitrovskaya", 24.0),
    ("Dinamo", 25.0),
    ("Dobryninskaya", 26.0),
    ("Domodedovskaya", 27.0),
    ("Dostoyevskaya", 28.0),
    ("Dubrovka", 29.0),
    ("Elektrozavodskaya", 30.0),
    ("Fili", 31.0),
    ("Filyovsky Park", 32.0),
    ("Fonvizinskaya", 33.0),
    ("Frunzenskaya", 34.0),
    ("Kaluzhskaya", 35.0),
    ("Kantemirovskaya", 36.0),
    ("Kashirskaya", 37.0),
    ("Kitay-Gorod", 38.0),
    ("Kolomenskaya", 39.0),
    ("Komsomolskaya", 40.0),
    ("Kropotkinskaya", 41.0),
    ("Krylatskoye", 42.0),
    ("Kuznetsky Most", 43.0),
    ("Leninsky Prospekt", 44.0),
    ("Lermontovsky Prospekt", 45.0),
    ("Lomonosovsky Prospekt", 46.0),
    ("Lubyanka", 47.0),
    ("Marksistskaya", 48.0),
    ("Marino", 49.0),
    ("Maryina Roshcha", 50.0),
    ("Mayakovskaya", 51.0),
    ("Medvedkovo", 52.0),
    ("Mezhdunarodnaya", 53.0),
    ("Michurinsky Prospekt", 54.0),
    ("Molodezhnaya", 55.0),
    ("Molodyozhnaya", 56.0),
    ("Moskovskaya", 57.0),
    ("Nagatinskaya", 58.0),
    ("Nagornaya", 59.0),
    ("Nakhimovsky Prospekt", 60.0),
    ("Nekrasovka", 61.0),
    ("Novogireyevo", 62.0),
    ("Novokosino", 63.0),
    ("Novokuznetskaya", 64.0),
    ("Novoslobodskaya", 65.0),
    ("Okhotny Ryad", 66.0),
    ("Oktyabrskaya", 67.0),
    ("Orekhovo", 68.0),
    ("Otradnoye", 69.0),
    ("Paveletskaya", 70.0),
    ("Pechatniki", 71.0),
    ("Perovo", 72.0),
    ("Pervomayskaya", 73.0),
    ("Petrovsko-Razumovskaya", 74.0),
    ("Pionerskaya", 75.0),
    ("Planernaya", 76.0),
    ("Ploshchad Ilyicha", 77.0),
    ("Ploshchad Revolyutsii", 78.0),
    ("Polezhayevskaya", 79.0),
    ("Polyanka", 80.0),
    ("Prazhskaya", 81.0),
    ("Preobrazhenskaya Ploshchad", 82.0),
    ("Proletarskaya", 83.0),
    ("Prospekt Mira", 84.0),
    ("Pushkinskaya", 85.0),
    ("Ramenki", 86.0),
    ("Rechnoy Vokzal", 87.0),
    ("Rimskaya", 88.0),
    ("Rizhskaya", 89.0),
    ("Rumyantsevo", 90.0),
    ("Ryazansky Prospekt", 91.0),
    ("Savyolovskaya", 92.0),
    ("Sevastopolskaya", 93.0),
    ("Semyonovskaya", 94.0),
    ("Serpukhovskaya", 95.0),
    ("Sokol", 96.0),
    ("Sokolniki", 97.0),
    ("Sportivnaya", 98.0),
    ("Sretensky Bulvar", 99.0),
    ("Strogino", 100.0),
    ("Studencheskaya", 101.0),
    ("Sukharevskaya", 102.0),
    ("Sviblovo", 103.0),
    ("Taganskaya", 104.0),
    ("Tekstilshchiki", 105.0),
    ("Teatralnaya", 106.0),
    ("Teply Stan", 107.0),
    ("Tverskaya", 108.0),
    ("Timiryazevskaya", 109.0),
    ("Troparevo", 110.0),
    ("Tulskaya", 111.0),
    ("Turgenevskaya", 112.0),
    ("Tushinskaya", 113.0),
    ("Ulitsa 1905 Goda", 114.0),
    ("Ulitsa Akademika Korolyova", 115.0),
    ("Ulitsa Gorchakova", 116.0),
    ("Ulitsa Starokachalovskaya", 117.0),
    ("Universitet", 118.0),
    ("Varshavskaya", 119.0),
    ("VDNKh", 120.0),
    ("Vernadskogo Prospekt", 121.0),
    ("Vladykino", 122.0),
    ("Vodny Stadion", 123.0),
    ("Voykovskaya", 124.0),
    ("Vykhino", 125.0),
    ("Yasenevo", 126.0),
    ("Yugo-Zapadnaya", 127.0),
    ("Yuzhnaya", 128.0),
    ("Vorobyovy Gory", 129.0),
    ("Zyablikovo", 130.0),
    ("Pionerskaya", 131.0),
    ("Slavyansky Bulvar", 132.0),
    ("Kuntsevskaya", 133.0),
    ("Kaluzhskaya", 134.0),
    ("Kitay-Gorod", 135.0),
    ("Komsomolskaya", 136.0),
    ("Krasnye Vorota", 137.0),
    ("Park Kultury", 138.0),
    ("Vorobyevy Gory", 139.0),
    ("Medvedkovo", 140.0),
    ("Skhodnenskaya", 141.0),
    ("Strogino", 142.0),
    ("Ulitsa Starokachalovskaya", 143.0),
    ("Troparevo", 144.0),
    ("Vladykino", 145.0),
    ("Mitino", 146.0),
    ("Sokol", 147.0),
    ("Zhulebino", 148.0),
    ("Vorobyovy Gory", 149.0),
    ("Lubyanka", 150.0),
    ("Leninsky Prospekt", 151.0),
    ("Ulitsa 1905 Goda", 152.0),
    ("Universitet", 153.0),
    ("Avtozavodskaya", 154.0),
    ("Molodezhnaya", 155.0),
    ("Pionerskaya", 156.0),
    ("Petrovsko-Razumovskaya", 157.0),
    ("Savyolovskaya", 158.0),
    ("Trubnaya", 159.0),
    ("Sheremetyevskaya", 160.0),
    ("Kantemirovskaya", 161.0),
    ("Turgenevskaya", 162.0),
    ("Avtozavodskaya", 163.0),
    ("Yasenevo", 164.0),
    ("Pionerskaya", 165.0),
    ("Paveletskaya", 166.0),
    ("Ulitsa Starokachalovskaya", 167.0),
    ("Vorobyovy Gory", 168.0),
    ("Nagornaya", 169.0),
    ("Polyanka", 170.0),
    ("Novoslobodskaya", 171.0),
    ("Ploshchad Ilyicha", 172.0),
    ("Ryazansky Prospekt", 173.0),
    ("Shabolovskaya", 174.0),
    ("Kropotkinskaya", 175.0),
    ("Rimskaya", 176.0),
    ("Kitay-Gorod", 177.0),
    ("Baumanskaya", 178.0),
    ("Dinamo", 179.0),
    ("Aleksandrovsky Sad", 180.0),
    ("Kievskaya", 181.0),
    ("Nagatinskaya", 182.0),
    ("Novokosino", 183.0),
    ("Mitino", 184.0),
    ("Arbatskaya", 185.0),
    ("Smolenskaya", 186.0),
    ("Novye Cheryomushki", 187.0),
    ("Otradnoye", 188.0),
    ("Paveletskaya", 189.0),
    ("Park Pobedy", 190.0),
    ("Partizanskaya", 191.0),
    ("Petrovsko-Razumovskaya", 192.0),
    ("Ploshchad Ilyicha", 193.0),
    ("Polezhayevskaya", 194.0),
    ("Polyanka", 195.0),
    ("Prazhskaya", 196.0),
    ("Preobrazhenskaya Ploshchad", 197.0),
    ("Profsoyuznaya", 198.0),
    ("Prokshino", 199.0),
    ("Proletarskaya", 200.0),
    ("Pushkinskaya", 201.0),
    ("Ramenki", 202.0),
    ("Rechnoy Vokzal", 203.0),
    ("Rizhskaya", 204.0),
    ("Rumyantsevo", 205.0),
    ("Ryazansky Prospekt", 206.0),
    ("Sevastopolskaya", 207.0),
    ("Shabolovskaya", 208.0),
    ("Shchelkovskaya", 209.0),
    ("Semyonovskaya", 210.0),
    ("Serpukhovskaya", 211.0),
    ("Shchyolkovskaya", 212.0),
    ("Skhodnenskaya", 213.0),
    ("Sokolniki", 214.0),
    ("Solntsevo", 215.0),
    ("Sportivnaya", 216.0),
    ("Sretensky Bulvar", 217.0),
    ("Strogino", 218.0),
    ("Studencheskaya", 219.0),
    ("Sukharevskaya", 220.0),
    ("Sviblovo", 221.0),
    ("Taganskaya", 222.0),
    ("Tekstilshchiki", 223.0),
    ("Teatralnaya", 224.0),
    ("Teply Stan", 225.0),
    ("Timiryazevskaya", 226.0),
    ("Tretyakovskaya", 227.0),
    ("Trubnaya", 228.0),
    ("Tulskaya", 229.0),
    ("Turgenevskaya", 230.0),
    ("Tushinskaya", 231.0),
    ("Ulitsa 1905 Goda", 232.0),
    ("Ulitsa Akademika Korolyova", 233.0),
    ("Ulitsa Dmitriya Donskogo", 234.0),
    ("Universitet", 235.0),
    ("Varshavskaya", 236.0),
    ("VDNKh", 237.0),
    ("Vernadskogo Prospekt", 238.0),
    ("Vladykino", 239.0),
    ("Vodny Stadion", 240.0),
    ("Voykovskaya", 241.0),
    ("Vykhino", 242.0),
    ("Yasenevo", 243.0),
    ("Yugo-Zapadnaya", 244.0),
    ("Yuzhnaya", 245.0),
    ("Zyablikovo", 246.0),
    ("Tsvetnoy Bulvar", 247.0),
    ("Nekrasovka", 248.0),
    ("Kashirskaya", 249.0),
    ("Kantemirovskaya", 250.0),
    ("Troparevo", 251.0),
    ("Kuzminki", 252.0),
    ("Savelovskaya", 253.0),
    ("Streshnevo", 254.0),
    ("Shelepikha", 255.0),
    ("Khoroshevskaya", 256.0),
    ("Nizhegorodskaya", 257.0),
    ("Lefortovo", 258.0),
];

lazy_static! {
    pub static ref CITY_TABLE: CategoryTable =
        CategoryTable::new("city", &[("Moscow", 1.0), ("Saint Petersburg", 2.0)]);
    pub static ref METRO_TABLE: CategoryTable = CategoryTable::new("metro", METRO_STATIONS);
    pub static ref RENOVATION_TABLE: CategoryTable = CategoryTable::new(
        "renovation",
        &[
            ("No renovation", 0.0),
            ("Cosmetic", 1.0),
            ("Euro", 2.0),
            ("Designer", 3.0),
        ],
    );
    pub static ref BATHROOM_TABLE: CategoryTable = CategoryTable::new(
        "bathroom",
        &[("Combined", 0.0), ("Separate", 1.0), ("Two or more", 2.0)],
    );
    pub static ref BALCONY_TABLE: CategoryTable = CategoryTable::new(
        "balcony",
        &[
            ("No", 0.0),
            ("Balcony", 1.0),
            ("Loggia", 2.0),
            ("Two or more", 3.0),
        ],
    );
    pub static ref PARKING_TABLE: CategoryTable = CategoryTable::new(
        "parking",
        &[
            ("No", 0.0),
            ("In the yard", 1.0),
            ("Guarded", 2.0),
            ("Underground", 3.0),
        ],
    );
    pub static ref UTILITIES_TABLE: CategoryTable = CategoryTable::new(
        "utilities_payment",
        &[("Included", 0.0), ("Separately", 1.0), ("Partially", 2.0)],
    );
    pub static ref DEPOSIT_TABLE: CategoryTable = CategoryTable::new(
        "deposit",
        &[
            ("No deposit", 0.0),
            ("0.5 month", 0.5),
            ("1 month", 1.0),
            ("2 months", 2.0),
        ],
    );
    pub static ref COMMISSION_TABLE: CategoryTable = CategoryTable::new(
        "commission",
        &[("No commission", 0.0), ("50%", 0.5), ("100%", 1.0)],
    );
}

static METRO_DUPLICATES_REPORTED: Once = Once::new();

pub fn encode_city(city: Option<&str>) -> f64 {
    CITY_TABLE.encode(city)
}

/// Encode a metro station.
///
/// The station catalogue repeats several names with different codes; the
/// last definition wins. The repeated names are logged once per process.
pub fn encode_metro(metro: Option<&str>) -> f64 {
    METRO_DUPLICATES_REPORTED.call_once(|| {
        let duplicates = METRO_TABLE.duplicate_keys();
        if !duplicates.is_empty() {
            warn!(
                table = METRO_TABLE.name(),
                count = duplicates.len(),
                names = ?duplicates,
                "Category table defines some names more than once, last code wins"
            );
        }
    });
    METRO_TABLE.encode(metro)
}

pub fn encode_renovation(renovation: Option<&str>) -> f64 {
    RENOVATION_TABLE.encode(renovation)
}

pub fn encode_bathroom(bathroom: Option<&str>) -> f64 {
    BATHROOM_TABLE.encode(bathroom)
}

pub fn encode_balcony(balcony: Option<&str>) -> f64 {
    BALCONY_TABLE.encode(balcony)
}

pub fn encode_parking(parking: Option<&str>) -> f64 {
    PARKING_TABLE.encode(parking)
}

pub fn encode_utilities_payment(payment: Option<&str>) -> f64 {
    UTILITIES_TABLE.encode(payment)
}

/// Deposit terms, in months (fractional codes allowed)
pub fn encode_deposit(deposit: Option<&str>) -> f64 {
    DEPOSIT_TABLE.encode(deposit)
}

/// Commission terms as a fraction of one month's rent
pub fn encode_commission(commission: Option<&str>) -> f64 {
    COMMISSION_TABLE.encode(commission)
}
