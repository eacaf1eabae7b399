//! Default locations, names and heuristics shared across the pipeline.

// Default dataset paths (relative to the working directory)
pub const DEFAULT_RAW_DATASET: &str = "data/raw/amazon_delivery.csv";
pub const DEFAULT_PROCESSED_DATASET: &str = "data/processed/deliveries_cleaned.csv";
pub const DEFAULT_CONFIG_FILE: &str = "etl.toml";

// Database defaults
pub const DEFAULT_DB_HOST: &str = "localhost";
pub const DEFAULT_DB_PORT: u16 = 5432;
pub const DEFAULT_DB_NAME: &str = "delivery_analytics";
pub const DEFAULT_DB_USER: &str = "postgres";
pub const DELIVERIES_TABLE: &str = "deliveries";
pub const DB_CONNECT_TIMEOUT_SECS: u64 = 10;

// KPI thresholds (advisory only)
pub const ON_TIME_DELIVERY_TARGET: f64 = 0.95;
pub const MAX_ACCEPTABLE_DELAY_HOURS: f64 = 24.0;
pub const COST_PER_DELIVERY_TARGET: f64 = 8.50;

/// Fill value for missing non-numeric cells
pub const MISSING_SENTINEL: &str = "Unknown";

/// Raw cell texts treated as missing when loading a CSV
pub const NA_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

// Column name fragments used by the default classifier
pub const IDENTIFIER_FRAGMENT: &str = "id";
pub const DATE_FRAGMENT: &str = "date";
pub const STATUS_FRAGMENT: &str = "status";

// Status keyword sets (substring match on the lower-cased status text)
pub const DELIVERED_KEYWORDS: &[&str] = &["delivered", "completed", "success", "delivered on time"];
pub const LATE_KEYWORDS: &[&str] = &["late", "delay"];

// Derived column names, in the order they are appended
pub const ORDER_YEAR: &str = "order_year";
pub const ORDER_MONTH: &str = "order_month";
pub const ORDER_DAY_OF_WEEK: &str = "order_day_of_week";
pub const ORDER_DAY_NAME: &str = "order_day_name";
pub const IS_DELIVERED: &str = "is_delivered";
pub const IS_LATE: &str = "is_late";
pub const IS_ON_TIME: &str = "is_on_time";

/// Rows shown by the `report` command
pub const REPORT_SAMPLE_ROWS: usize = 5;

pub const LOG_DIR: &str = "logs";
pub const LOG_FILE_PREFIX: &str = "delivery_etl.log";
