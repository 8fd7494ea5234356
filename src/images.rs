use base64::{Engine as _, engine::general_purpose::STANDARD};

use crate::error::ApiError;

// 5 MB of binary is ~6.7 MB once base64 encoded.
const MAX_IMAGE_DATA_LEN: usize = 7 * 1024 * 1024;

/// Accepts `data:<mime>;base64,<payload>` strings as produced by browsers.
/// Blank input means "no image".
pub fn validate_image_data(image: Option<String>) -> Result<Option<String>, ApiError> {
    let Some(image) = image.filter(|s| !s.trim().is_empty()) else {
        return Ok(None);
    };

    if image.len() > MAX_IMAGE_DATA_LEN {
        return Err(ApiError::validation("image is too large (max 5MB)"));
    }

    let payload = image
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(";base64,"))
        .map(|(_, payload)| payload)
        .ok_or_else(|| ApiError::validation("image must be a base64 data URL"))?;

    STANDARD
        .decode(payload)
        .map_err(|_| ApiError::validation("image payload is not valid base64"))?;

    Ok(Some(image))
}

/// New image if one was sent, otherwise whatever the client says it had.
pub fn replace_or_keep(
    new_image: Option<String>,
    existing: Option<String>,
) -> Result<Option<String>, ApiError> {
    match validate_image_data(new_image)? {
        Some(img) => Ok(Some(img)),
        None => validate_image_data(existing),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_data_urls() {
        let img = "data:image/png;base64,aGVsbG8=".to_string();
        assert_eq!(validate_image_data(Some(img.clone())).unwrap(), Some(img));
    }

    #[test]
    fn blank_means_none() {
        assert_eq!(validate_image_data(None).unwrap(), None);
        assert_eq!(validate_image_data(Some("  ".into())).unwrap(), None);
    }

    #[test]
    fn rejects_plain_urls_and_bad_base64() {
        assert!(validate_image_data(Some("https://x/y.png".into())).is_err());
        assert!(validate_image_data(Some("data:image/png;base64,@@@".into())).is_err());
    }

    #[test]
    fn new_image_wins_over_existing() {
        let old = Some("data:image/png;base64,b2xk".to_string());
        let new = Some("data:image/png;base64,bmV3".to_string());
        assert_eq!(replace_or_keep(new.clone(), old.clone()).unwrap(), new);
        assert_eq!(replace_or_keep(None, old.clone()).unwrap(), old);
    }
}
