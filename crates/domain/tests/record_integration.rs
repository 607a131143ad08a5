//! Integration tests for the catalog domain model.
//!
//! These tests drive records the way requests do: JSON in, validation,
//! updates, and paging of query results.

use domain::{
    DomainError, Money, NewRecord, Order, OrderStatus, Page, Pagination, Record, RecordFilter,
    RecordFormat, RecordId, RecordUpdate, Track,
};

mod record_input {
    use super::*;

    #[test]
    fn json_input_is_validated_and_trimmed() {
        let new: NewRecord = serde_json::from_value(serde_json::json!({
            "artist": " Joy Division ",
            "album": "Closer",
            "format": "vinyl",
            "price": 2250,
            "qty": 4,
            "category": " Post-punk",
            "mbid": " mb-closer "
        }))
        .unwrap();

        let new = new.validate().unwrap();

        assert_eq!(new.artist, "Joy Division");
        assert_eq!(new.category, "Post-punk");
        assert_eq!(new.mbid.as_deref(), Some("mb-closer"));
        assert_eq!(new.format, RecordFormat::Vinyl);
        assert_eq!(new.price, Money::from_cents(2250));
        assert!(new.tracklist.is_empty());
    }

    #[test]
    fn unknown_format_fails_deserialization() {
        let result = serde_json::from_value::<NewRecord>(serde_json::json!({
            "artist": "Joy Division",
            "album": "Closer",
            "format": "minidisc",
            "price": 2250,
            "qty": 4,
            "category": "Post-punk"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn blank_mbid_is_rejected() {
        let err = NewRecord::new(
            "Joy Division",
            "Closer",
            RecordFormat::Cd,
            Money::from_cents(1500),
            1,
            "Post-punk",
        )
        .with_mbid("   ")
        .validate()
        .unwrap_err();

        assert_eq!(
            err,
            DomainError::validation("mbid", "must not be empty")
        );
    }

    #[test]
    fn update_validation_matches_create_validation() {
        let update = RecordUpdate {
            album: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(update.validate().is_err());

        let update = RecordUpdate {
            tracklist: Some(vec![Track::new(2, "Atrocity Exhibition")]),
            ..Default::default()
        };
        assert!(update.validate().is_err());

        let update = RecordUpdate {
            artist: Some(" New Order ".to_string()),
            ..Default::default()
        }
        .validate()
        .unwrap();
        assert_eq!(update.artist.as_deref(), Some("New Order"));
    }
}

mod record_lifecycle {
    use super::*;

    fn record() -> Record {
        Record::from_new(
            NewRecord::new(
                "Joy Division",
                "Unknown Pleasures",
                RecordFormat::Vinyl,
                Money::from_cents(2400),
                10,
                "Post-punk",
            )
            .validate()
            .unwrap(),
        )
    }

    #[test]
    fn new_records_get_distinct_ids_and_matching_timestamps() {
        let a = record();
        let b = record();
        assert_ne!(a.id, b.id);
        assert_eq!(a.created_at, a.updated_at);
    }

    #[test]
    fn setting_an_mbid_keeps_other_fields() {
        let mut record = record();
        record.apply_update(RecordUpdate {
            mbid: Some("mb-unknown".to_string()),
            tracklist: Some(vec![Track::new(1, "Disorder")]),
            ..Default::default()
        });

        assert_eq!(record.mbid.as_deref(), Some("mb-unknown"));
        assert_eq!(record.tracklist.len(), 1);
        assert_eq!(record.qty, 10);
        assert!(record.has_identity("Joy Division", "Unknown Pleasures", RecordFormat::Vinyl));
    }

    #[test]
    fn record_json_round_trips_with_canonical_format() {
        let record = record();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["format"], "Vinyl");
        assert_eq!(json["price"], 2400);

        let back: Record = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn orders_start_pending_for_their_record() {
        let id = RecordId::new();
        let order = Order::pending(id, 3);
        assert_eq!(order.record_id, id);
        assert_eq!(order.quantity, 3);
        assert_eq!(order.status, OrderStatus::Pending);
    }
}

mod queries {
    use super::*;

    #[test]
    fn filter_from_query_pairs_normalizes_values() {
        let filter = RecordFilter::from_pairs([
            ("search", "  closer "),
            ("format", "CD"),
            ("album", " "),
        ])
        .unwrap();

        assert_eq!(filter.search.as_deref(), Some("closer"));
        assert_eq!(filter.format, Some(RecordFormat::Cd));
        assert_eq!(filter.album, None);
    }

    #[test]
    fn bad_format_in_filter_is_a_validation_error() {
        let err = RecordFilter::from_pairs([("format", "reel")]).unwrap_err();
        assert!(matches!(err, DomainError::Validation { field: "format", .. }));
    }

    #[test]
    fn page_metadata_reflects_totals() {
        let pagination = Pagination::new(2, 25).unwrap();
        let page: Page<u32> = Page::new((0..25).collect(), 60, pagination);

        assert_eq!(page.page, 2);
        assert_eq!(page.limit, 25);
        assert_eq!(page.total_pages, 3);
        assert_eq!(pagination.skip(), 25);
    }

    #[test]
    fn empty_result_has_no_pages() {
        let page: Page<u32> = Page::new(Vec::new(), 0, Pagination::default());
        assert_eq!(page.total_pages, 0);
    }
}
