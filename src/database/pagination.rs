use serde::{Deserialize, Serialize};

use crate::error::{Error, HtmlError};

/// Offsets come straight from the query string.
pub fn check_offset(offset: i64) -> Result<(), Error> {
    if offset < 0 {
        return Err(
            HtmlError::InvalidRequest.new("offset: Ensure this value is greater than or equal to 0")
        );
    }
    Ok(())
}

#[derive(Serialize, Deserialize, Debug)]
pub struct PageContext<T> {
    pub rows: Vec<T>,
    pub total_rows: i64,
    pub next_offset: Option<i64>,
    pub prev_offset: Option<i64>,
    pub page_list: Vec<(String, i64)>,
    pub message: Option<String>,
}

impl<T> PageContext<T> {
    /// Builds a page from rows fetched with `LIMIT page_size OFFSET current_offset`,
    /// where `total_rows` is the windowed `COUNT(*) OVER()` of the unpaginated query.
    pub fn from_rows(rows: Vec<T>, total_rows: i64, page_size: i64, current_offset: i64) -> Self {
        if rows.is_empty() || page_size <= 0 {
            return Self::no_rows();
        }

        let next_offset = current_offset + page_size;
        let next_offset = (next_offset < total_rows).then_some(next_offset);
        let prev_offset = (current_offset > 0).then(|| (current_offset - page_size).max(0));

        let page_count = (total_rows + page_size - 1) / page_size;
        let current_page = current_offset / page_size;

        let page_list = (0..page_count)
            .map(|n| {
                let page = if n == current_page {
                    String::from("...")
                } else {
                    format!("{}", n + 1)
                };

                (page, n * page_size)
            })
            .collect();

        Self {
            rows,
            total_rows,
            next_offset,
            prev_offset,
            page_list,
            message: Some(format!(
                "{} - {} / {}",
                current_offset,
                (current_offset + page_size).min(total_rows),
                total_rows
            )),
        }
    }

    pub fn no_rows() -> Self {
        Self {
            rows: vec![],
            total_rows: 0,
            next_offset: None,
            prev_offset: None,
            page_list: vec![(String::from("1"), 0)],
            message: Some(String::from("No results")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_page_links_forward_only() {
        let page = PageContext::from_rows(vec![1, 2, 3], 7, 3, 0);
        assert_eq!(page.next_offset, Some(3));
        assert_eq!(page.prev_offset, None);
        assert_eq!(
            page.page_list,
            vec![
                (String::from("..."), 0),
                (String::from("2"), 3),
                (String::from("3"), 6)
            ]
        );
        assert_eq!(page.message.as_deref(), Some("0 - 3 / 7"));
    }

    #[test]
    fn last_page_links_backward_only() {
        let page = PageContext::from_rows(vec![7], 7, 3, 6);
        assert_eq!(page.next_offset, None);
        assert_eq!(page.prev_offset, Some(3));
        assert_eq!(page.message.as_deref(), Some("6 - 7 / 7"));
    }

    #[test]
    fn negative_offset_is_a_bad_request() {
        assert!(check_offset(0).is_ok());
        assert!(check_offset(12).is_ok());

        let error = check_offset(-1).unwrap_err();
        assert_eq!(error.code(), 400);
    }

    #[test]
    fn empty_rows_produce_placeholder_page() {
        let page: PageContext<i32> = PageContext::from_rows(vec![], 0, 10, 0);
        assert_eq!(page.total_rows, 0);
        assert_eq!(page.page_list, vec![(String::from("1"), 0)]);
        assert_eq!(page.message.as_deref(), Some("No results"));
    }
}
