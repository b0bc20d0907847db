//! Common validation utilities.

use validator::ValidationError;

/// Maximum length of a stored file name.
pub const MAX_FILE_NAME_LENGTH: usize = 255;

/// Required extension for uploaded and enriched files.
pub const CSV_EXTENSION: &str = ".csv";

/// Validates that a file name ends with the CSV extension and fits the
/// catalog's name column.
pub fn validate_csv_name(name: &str) -> Result<(), ValidationError> {
    if name.len() > MAX_FILE_NAME_LENGTH {
        let mut err = ValidationError::new("file_name_length");
        err.message = Some(
            format!("File name must be at most {MAX_FILE_NAME_LENGTH} characters").into(),
        );
        return Err(err);
    }

    // Require a non-empty stem, not just the extension
    if !name.ends_with(CSV_EXTENSION) || name.len() == CSV_EXTENSION.len() {
        let mut err = ValidationError::new("csv_extension");
        err.message = Some("File name must end with .csv".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that an endpoint URL uses the http or https scheme.
///
/// Shape validation (host, syntax) is handled by `validator`'s `url` rule;
/// this only rejects non-web schemes such as `file://` or `ftp://`.
pub fn validate_http_url(url: &str) -> Result<(), ValidationError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        let mut err = ValidationError::new("url_scheme");
        err.message = Some("API endpoint must be an http or https URL".into());
        Err(err)
    }
}
