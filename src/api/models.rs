use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Deserialize)]
pub struct QueryParams {
    pub prompt: String,
}

#[derive(Deserialize, Default)]
pub struct ResultsParams {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl ResultsParams {
    /// Validated `(page, page_size)`.
    pub fn validate(&self) -> Result<(u32, u32)> {
        let page = self.page.unwrap_or(1);
        let page_size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE);

        if page < 1 {
            return Err(AppError::BadRequest("page must be at least 1".to_string()));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(AppError::BadRequest(format!(
                "page_size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }

        Ok((page, page_size))
    }
}

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
}
