//! Test fixtures and constants.

/// A valid age recipient that is not the account identity.
pub const OTHER_RECIPIENT: &str = "age1ql3z7hjy54pw3hyww5ayyfg7zqgvc7w3j2elw8zmrj2kg5sfn9aqmcac8p";

/// Values used across multiple tests.
pub const STANDARD_VALUES: &[(&str, &str)] = &[
    ("DATABASE_URL", "postgres://localhost/mydb"),
    ("API_KEY", "sk-test-12345"),
    ("JWT_SECRET", "super-secret-jwt-token"),
];

/// Sample .env file for import tests.
pub const SAMPLE_ENV: &str = "\
# local development
KEY1=value1
KEY2=\"two words\"
KEY3='single quoted'
";
