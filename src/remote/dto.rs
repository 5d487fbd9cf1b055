use serde::Deserialize;

use crate::model::{Item, Page};

/// Wire shape of a listing response.
#[derive(Debug, Deserialize)]
pub(super) struct PageDto {
    pub page: u32,
    #[serde(default)]
    pub results: Vec<ItemDto>,
    pub total_pages: u32,
    #[serde(default)]
    pub total_results: u64,
}

/// Wire shape of one movie. Only the fields the engine uses are decoded.
#[derive(Debug, Deserialize)]
pub(super) struct ItemDto {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub overview: String,
    pub poster_path: Option<String>,
    pub release_date: Option<String>,
    pub vote_average: Option<f64>,
}

impl From<ItemDto> for Item {
    fn from(dto: ItemDto) -> Self {
        Item {
            id: dto.id,
            title: dto.title,
            overview: dto.overview,
            poster_ref: dto.poster_path,
            release_date: dto.release_date.filter(|d| !d.is_empty()),
            score: dto.vote_average,
        }
    }
}

impl From<PageDto> for Page {
    fn from(dto: PageDto) -> Self {
        // An empty search reports zero pages; a page always exists.
        Page {
            page_number: dto.page.max(1),
            items: dto.results.into_iter().map(Item::from).collect(),
            total_pages: dto.total_pages.max(1),
            total_results: dto.total_results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_maps_wire_fields() {
        let body = r#"{
            "page": 1,
            "results": [{
                "id": 27205,
                "title": "Inception",
                "overview": "A thief...",
                "poster_path": "/inception.jpg",
                "release_date": "2010-07-15",
                "vote_average": 8.4,
                "adult": false
            }],
            "total_pages": 5,
            "total_results": 100
        }"#;

        let page: Page = serde_json::from_str::<PageDto>(body).unwrap().into();
        assert_eq!(page.total_pages, 5);
        assert_eq!(page.total_results, 100);
        let item = &page.items[0];
        assert_eq!(item.id, 27205);
        assert_eq!(item.poster_ref.as_deref(), Some("/inception.jpg"));
        assert_eq!(item.release_date.as_deref(), Some("2010-07-15"));
        assert_eq!(item.score, Some(8.4));
    }

    #[test]
    fn test_missing_optional_fields() {
        let body = r#"{"page":1,"results":[{"id":1,"poster_path":null,"release_date":""}],"total_pages":1}"#;
        let page: Page = serde_json::from_str::<PageDto>(body).unwrap().into();
        let item = &page.items[0];
        assert_eq!(item.title, "");
        assert!(item.poster_ref.is_none());
        assert!(item.release_date.is_none());
        assert!(item.score.is_none());
    }

    #[test]
    fn test_zero_total_pages_normalised() {
        let body = r#"{"page":1,"results":[],"total_pages":0,"total_results":0}"#;
        let page: Page = serde_json::from_str::<PageDto>(body).unwrap().into();
        assert_eq!(page.total_pages, 1);
        assert!(!page.has_more());
    }
}
