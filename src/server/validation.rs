use serde_json::Value;

const MAX_NAME_LEN: usize = 255;
const MAX_SLUG_LEN: usize = 255;
const MAX_CODE_LEN: usize = 50;
const MAX_PHONE_LEN: usize = 50;

pub fn validate_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Name cannot be empty".to_string());
    }
    if name.len() > MAX_NAME_LEN {
        return Err(format!("Name cannot exceed {MAX_NAME_LEN} characters"));
    }
    Ok(())
}

pub fn validate_slug(slug: &str) -> Result<(), String> {
    if slug.len() > MAX_SLUG_LEN {
        return Err(format!("Slug cannot exceed {MAX_SLUG_LEN} characters"));
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err("Slug can only contain lowercase letters, digits, and hyphens".to_string());
    }
    if slug.starts_with('-') || slug.ends_with('-') {
        return Err("Slug cannot start or end with a hyphen".to_string());
    }
    Ok(())
}

pub fn validate_code(code: &str) -> Result<(), String> {
    if code.len() > MAX_CODE_LEN {
        return Err(format!("Code cannot exceed {MAX_CODE_LEN} characters"));
    }
    Ok(())
}

pub fn validate_phone(phone: &str) -> Result<(), String> {
    if phone.len() > MAX_PHONE_LEN {
        return Err(format!("Phone cannot exceed {MAX_PHONE_LEN} characters"));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), String> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err("Email must contain '@'".to_string());
    };
    if local.is_empty() || domain.is_empty() || !domain.contains('.') {
        return Err("Email is not a valid address".to_string());
    }
    if email.contains(char::is_whitespace) {
        return Err("Email cannot contain whitespace".to_string());
    }
    Ok(())
}

pub fn validate_url(url: &str) -> Result<(), String> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err("URL must start with http:// or https://".to_string());
    }
    if url.contains(char::is_whitespace) {
        return Err("URL cannot contain whitespace".to_string());
    }
    Ok(())
}

/// Extensible key/value maps must be JSON objects.
pub fn validate_object(value: &Value) -> Result<(), String> {
    if value.is_object() {
        Ok(())
    } else {
        Err("Must be a JSON object".to_string())
    }
}
