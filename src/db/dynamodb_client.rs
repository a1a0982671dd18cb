use std::collections::HashMap;
use aws_sdk_dynamodb::types::AttributeValue;

use crate::errors::AppError;

pub fn get_attribute(item: &HashMap<String, AttributeValue>, name: &str) -> Result<String, AppError> {
    get_optional_attribute(item, name)
        .ok_or_else(|| AppError::UnexpectedError(format!("field {} is null", name)))
}

pub fn get_optional_attribute(item: &HashMap<String, AttributeValue>, name: &str) -> Option<String> {
    item
        .get(name)
        .and_then(|attr|
            if attr.is_n() {
                attr.as_n().ok()
            } else {
                attr.as_s().ok()
            }
        )
        .cloned()
}
