use rocket::serde::Serialize;
use schemars::JsonSchema;

/// Paginated response wrapper with metadata.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    /// Current page number (1-indexed).
    pub page: i64,
    pub page_size: i64,
    pub total_items: i64,
    pub total_pages: i64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, page: i64, page_size: i64, total_items: i64) -> Self {
        let total_pages = if page_size > 0 {
            (total_items + page_size - 1) / page_size
        } else {
            1
        };

        Self {
            data,
            page,
            page_size,
            total_items,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_rounds_up() {
        let response = PaginatedResponse::new(vec![1, 2, 3], 1, 3, 10);
        assert_eq!(response.total_pages, 4);
        let response = PaginatedResponse::new(Vec::<i32>::new(), 1, 5, 10);
        assert_eq!(response.total_pages, 2);
    }
}
