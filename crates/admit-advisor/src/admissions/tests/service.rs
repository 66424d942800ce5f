use super::common::*;
use chrono::Duration;
use serde_json::json;
use std::sync::Arc;

use crate::admissions::catalog::{
    index, AuthError, CatalogService, CatalogServiceError, CommittedCatalog, IngestionError,
    IngestionReceipt, KeyValueStore, RecommendationQuery, ScoresUpdate, SharedSecretAuthority,
    StagedChunk, StoreError,
};
use crate::admissions::domain::{
    AdmissionTrack, ExamSubject, ExamSubjectScore, RawGradeEntry, SubGroup, Tier,
};

fn rolling_query(gpa: f64) -> RecommendationQuery {
    RecommendationQuery {
        gpa_equivalent: gpa,
        exam_average: 0.0,
        track: AdmissionTrack::Rolling,
        sub_group: None,
    }
}

#[test]
fn commit_sorts_catalog_and_writes_grade_bands() {
    let (service, store) = seeded_service();

    let catalog = service
        .get_catalog(AdmissionTrack::Rolling)
        .expect("catalog readable");
    let cutoffs: Vec<f64> = catalog.iter().map(|entry| entry.primary_cutoff()).collect();
    assert_eq!(cutoffs, vec![1.4, 1.5, 1.8, 1.9, 2.6, 3.1]);

    let band_one = service
        .band(AdmissionTrack::Rolling, 1)
        .expect("band readable");
    assert_eq!(band_one.len(), 4);
    assert_eq!(band_one[0].year, 2023);
    let band_three = service
        .band(AdmissionTrack::Rolling, 3)
        .expect("band readable");
    assert_eq!(band_three[0].university, "경희대학교");

    let keys = store.keys();
    for band in [1, 2, 3] {
        assert!(keys.contains(&index::band_key(AdmissionTrack::Rolling, band)));
    }
    assert!(store
        .raw(&index::updated_at_key(AdmissionTrack::Rolling))
        .is_some());
}

#[test]
fn recommit_drops_stale_bands() {
    let (service, store) = seeded_service();
    let only_upper = service
        .get_catalog(AdmissionTrack::Rolling)
        .expect("catalog readable")
        .into_iter()
        .filter(|entry| entry.primary_cutoff() >= 2.0)
        .collect();

    let total = service
        .put_catalog(AdmissionTrack::Rolling, only_upper, now())
        .expect("commit succeeds");

    assert_eq!(total, 2);
    assert!(store
        .raw(&index::band_key(AdmissionTrack::Rolling, 1))
        .is_none());
    assert!(service
        .band(AdmissionTrack::Rolling, 1)
        .expect("band readable")
        .is_empty());
    assert_eq!(
        service
            .band(AdmissionTrack::Rolling, 2)
            .expect("band readable")
            .len(),
        1
    );
}

#[test]
fn staged_chunks_stay_invisible_until_final_chunk() {
    let (service, store) = build_service();
    let mut rows = rolling_rows();
    let tail = rows.split_off(3);

    let receipt = service
        .ingest_chunk(upload(AdmissionTrack::Rolling, 0, false, rows), now())
        .expect("chunk staged");
    assert_eq!(
        receipt,
        IngestionReceipt::Staged(StagedChunk {
            success: true,
            chunk_index: 0,
            chunks_received: 1,
        })
    );
    assert!(service
        .get_catalog(AdmissionTrack::Rolling)
        .expect("catalog readable")
        .is_empty());

    let receipt = service
        .ingest_chunk(upload(AdmissionTrack::Rolling, 1, true, tail), now())
        .expect("catalog committed");
    assert_eq!(
        receipt,
        IngestionReceipt::Committed(CommittedCatalog {
            success: true,
            total_entries: 6,
        })
    );
    assert!(store
        .raw(&index::staging_key(AdmissionTrack::Rolling))
        .is_none());
    assert_eq!(
        service
            .get_catalog(AdmissionTrack::Rolling)
            .expect("catalog readable")
            .len(),
        6
    );
}

#[test]
fn resent_chunk_index_replaces_previous_rows() {
    let (service, _) = build_service();
    let rows = rolling_rows();

    service
        .ingest_chunk(
            upload(AdmissionTrack::Rolling, 0, false, rows[0..2].to_vec()),
            now(),
        )
        .expect("chunk 0 staged");
    service
        .ingest_chunk(
            upload(AdmissionTrack::Rolling, 1, false, rows[2..6].to_vec()),
            now(),
        )
        .expect("chunk 1 staged");
    let receipt = service
        .ingest_chunk(
            upload(AdmissionTrack::Rolling, 1, false, rows[2..3].to_vec()),
            now(),
        )
        .expect("chunk 1 re-staged");
    match receipt {
        IngestionReceipt::Staged(staged) => assert_eq!(staged.chunks_received, 2),
        other => panic!("expected staged receipt, got {other:?}"),
    }

    match service.ingest_chunk(upload(AdmissionTrack::Rolling, 2, true, Vec::new()), now()) {
        Ok(IngestionReceipt::Committed(committed)) => assert_eq!(committed.total_entries, 3),
        other => panic!("expected commit, got {other:?}"),
    }
}

#[test]
fn chunk_zero_starts_a_fresh_upload() {
    let (service, _) = build_service();
    let rows = rolling_rows();

    service
        .ingest_chunk(
            upload(AdmissionTrack::Rolling, 0, false, rows[0..3].to_vec()),
            now(),
        )
        .expect("chunk 0 staged");
    service
        .ingest_chunk(
            upload(AdmissionTrack::Rolling, 1, false, rows[3..6].to_vec()),
            now(),
        )
        .expect("chunk 1 staged");

    match service.ingest_chunk(
        upload(AdmissionTrack::Rolling, 0, true, rows[0..1].to_vec()),
        now(),
    ) {
        Ok(IngestionReceipt::Committed(committed)) => assert_eq!(committed.total_entries, 1),
        other => panic!("expected commit, got {other:?}"),
    }
}

#[test]
fn upload_requires_the_admin_token() {
    let (service, store) = build_service();

    let mut wrong = upload(AdmissionTrack::Rolling, 0, true, rolling_rows());
    wrong.auth_token = Some("guess".to_string());
    match service.ingest_chunk(wrong, now()) {
        Err(CatalogServiceError::Auth(AuthError::InvalidToken)) => {}
        other => panic!("expected invalid token, got {other:?}"),
    }

    let mut missing = upload(AdmissionTrack::Rolling, 0, true, rolling_rows());
    missing.auth_token = None;
    match service.ingest_chunk(missing, now()) {
        Err(CatalogServiceError::Auth(AuthError::MissingToken)) => {}
        other => panic!("expected missing token, got {other:?}"),
    }

    assert!(store.keys().is_empty(), "nothing may be staged or committed");
}

#[test]
fn unconfigured_authority_refuses_every_upload() {
    let service = CatalogService::new(
        Arc::new(MemoryStore::default()),
        Arc::new(SharedSecretAuthority::new(None)),
        Arc::new(MemorySessions::default()),
    );

    match service.ingest_chunk(upload(AdmissionTrack::Rolling, 0, true, rolling_rows()), now()) {
        Err(CatalogServiceError::Auth(AuthError::InvalidToken)) => {}
        other => panic!("expected refusal, got {other:?}"),
    }
}

#[test]
fn malformed_chunk_leaves_committed_catalog_untouched() {
    let (service, _) = seeded_service();
    let mut rows = rolling_rows();
    rows.push(row(json!({ "대학명": "한양대학교", "학과명": "경영학부" })));

    match service.ingest_chunk(upload(AdmissionTrack::Rolling, 0, true, rows), now()) {
        Err(CatalogServiceError::Ingestion(IngestionError::MissingField {
            row: 6,
            field: "year",
        })) => {}
        other => panic!("expected ingestion failure, got {other:?}"),
    }

    assert_eq!(
        service
            .get_catalog(AdmissionTrack::Rolling)
            .expect("catalog readable")
            .len(),
        6
    );
}

#[test]
fn empty_upload_leaves_committed_catalog_untouched() {
    let (service, store) = seeded_service();
    let stamp_before = store.raw("universities_susi_updated_at");

    match service.ingest_chunk(upload(AdmissionTrack::Rolling, 0, true, Vec::new()), now()) {
        Err(CatalogServiceError::Ingestion(IngestionError::EmptyChunk(0))) => {}
        other => panic!("expected empty chunk error, got {other:?}"),
    }

    assert_eq!(
        service
            .get_catalog(AdmissionTrack::Rolling)
            .expect("catalog readable")
            .len(),
        6
    );
    assert_eq!(store.raw("universities_susi_updated_at"), stamp_before);
    assert!(store.raw("universities_susi_chunks").is_none());
}

#[test]
fn empty_intermediate_chunk_is_rejected() {
    let (service, _) = build_service();
    match service.ingest_chunk(upload(AdmissionTrack::Rolling, 3, false, Vec::new()), now()) {
        Err(CatalogServiceError::Ingestion(IngestionError::EmptyChunk(3))) => {}
        other => panic!("expected empty chunk error, got {other:?}"),
    }
}

#[test]
fn recommend_ranks_rolling_catalog() {
    let (service, _) = seeded_service();

    let response = service.recommend(rolling_query(1.8), now());

    assert!(response.notice.is_none());
    assert!(response.groups.is_none());
    let candidates = response.candidates.expect("rolling list");
    assert_eq!(candidates.len(), 6);
    assert_eq!(candidates[0].entry.university, "경희대학교");
    assert_eq!(candidates[0].probability, 62);
    assert_eq!(candidates[0].tier, Tier::A);

    let seoul = candidates
        .iter()
        .find(|candidate| candidate.entry.university == "서울대학교")
        .expect("seoul ranked");
    assert_eq!(seoul.recent_history.len(), 2);
    assert_eq!(seoul.recent_history[0].year, 2024);
}

#[test]
fn cached_result_is_served_within_ttl_and_invalidated_on_commit() {
    let (service, store) = seeded_service();
    let first = service.recommend(rolling_query(1.8), now());
    let cache_key = "universities_susi_18_0";
    assert!(store.raw(cache_key).is_some());

    store
        .put(&index::catalog_key(AdmissionTrack::Rolling), "[]".to_string())
        .expect("direct write");
    let cached = service.recommend(rolling_query(1.8), now() + Duration::minutes(30));
    assert_eq!(cached, first);

    service
        .put_catalog(AdmissionTrack::Rolling, Vec::new(), now())
        .expect("commit succeeds");
    assert!(store.raw(cache_key).is_none());

    let refreshed = service.recommend(rolling_query(1.8), now());
    assert!(refreshed.is_empty());
    assert!(refreshed.notice.is_some());
}

#[test]
fn expired_cache_entry_is_recomputed() {
    let (service, store) = seeded_service();
    service.recommend(rolling_query(1.8), now());

    let trimmed: Vec<_> = service
        .get_catalog(AdmissionTrack::Rolling)
        .expect("catalog readable")
        .into_iter()
        .take(2)
        .collect();
    store
        .put(
            &index::catalog_key(AdmissionTrack::Rolling),
            serde_json::to_string(&trimmed).expect("serialize"),
        )
        .expect("direct write");

    let later = service.recommend(rolling_query(1.8), now() + Duration::hours(2));
    assert_eq!(later.len(), 2);
}

#[test]
fn store_outage_degrades_to_notice() {
    let service = CatalogService::new(
        Arc::new(UnavailableStore),
        Arc::new(SharedSecretAuthority::new(Some(ADMIN_TOKEN.to_string()))),
        Arc::new(MemorySessions::default()),
    );

    let response = service.recommend(rolling_query(2.0), now());
    assert!(response.is_empty());
    assert_eq!(response.candidates, Some(Vec::new()));
    assert!(response.notice.is_some());

    match service.status(now()) {
        Err(StoreError::Unavailable(_)) => {}
        other => panic!("expected unavailable store, got {other:?}"),
    }
}

#[test]
fn corrupt_cache_entry_is_treated_as_a_miss() {
    let (service, store) = seeded_service();
    store
        .put("universities_susi_18_0", "{not json".to_string())
        .expect("direct write");

    let response = service.recommend(rolling_query(1.8), now());
    assert_eq!(response.len(), 6);
    assert!(response.notice.is_none());
}

#[test]
fn exam_recommendations_come_grouped_or_filtered() {
    let (service, _) = seeded_service();
    let mut query = RecommendationQuery {
        gpa_equivalent: 0.0,
        exam_average: 1.5,
        track: AdmissionTrack::ExamBased,
        sub_group: None,
    };

    let grouped = service.recommend(query, now());
    let groups = grouped.groups.expect("three windows");
    assert_eq!(groups.ga.len(), 2);
    assert_eq!(groups.na.len(), 1);
    assert_eq!(groups.da.len(), 1);
    assert!(grouped.candidates.is_none());

    query.sub_group = Some(SubGroup::Na);
    let filtered = service.recommend(query, now());
    let candidates = filtered.candidates.expect("filtered list");
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].entry.university, "고려대학교");
    assert!(filtered.groups.is_none());
}

#[test]
fn status_counts_both_tracks() {
    let (service, _) = seeded_service();
    let status = service.status(now()).expect("status readable");
    assert_eq!(status.susi_count, 6);
    assert_eq!(status.jungsi_count, 4);
    assert_eq!(status.total, 10);
    assert_eq!(status.last_updated, Some(now()));

    let (empty, _) = build_service();
    let status = empty.status(now()).expect("status readable");
    assert_eq!(status.total, 0);
    assert!(status.last_updated.is_none());
}

#[test]
fn lookup_returns_latest_row_with_history() {
    let (service, _) = seeded_service();
    let lookup = service
        .lookup(AdmissionTrack::Rolling, "서울대학교", "경영학과")
        .expect("lookup readable")
        .expect("department known");
    assert_eq!(lookup.latest.year, 2024);
    assert_eq!(lookup.history.len(), 2);

    assert!(service
        .lookup(AdmissionTrack::Rolling, "서울대학교", "의예과")
        .expect("lookup readable")
        .is_none());
}

#[test]
fn saved_scores_merge_partial_updates() {
    let (service, _) = build_service();
    let grades = vec![RawGradeEntry {
        subject: "국어".to_string(),
        term: "1-1".to_string(),
        grade: 2,
        weight: 4,
        raw_score: Some(91),
    }];
    let exam = vec![ExamSubjectScore {
        subject: ExamSubject::Math,
        grade: 1,
        standard_score: Some(138.0),
        percentile: Some(98.0),
    }];

    service
        .save_scores(
            SESSION_USER,
            ScoresUpdate {
                grades: grades.clone(),
                exam: Vec::new(),
            },
            now(),
        )
        .expect("saved");
    let later = now() + Duration::days(1);
    let merged = service
        .save_scores(
            SESSION_USER,
            ScoresUpdate {
                grades: Vec::new(),
                exam: exam.clone(),
            },
            later,
        )
        .expect("saved");

    assert_eq!(merged.grades, grades);
    assert_eq!(merged.exam, exam);
    assert_eq!(merged.updated_at, later);

    let loaded = service
        .load_scores(SESSION_USER)
        .expect("readable")
        .expect("present");
    assert_eq!(loaded, merged);
    assert!(service.load_scores("someone-else").expect("readable").is_none());
}

#[test]
fn authenticate_resolves_known_sessions_only() {
    let (service, _) = build_service();
    assert_eq!(
        service.authenticate(Some(SESSION_TOKEN)).expect("known"),
        SESSION_USER
    );
    match service.authenticate(None) {
        Err(AuthError::MissingToken) => {}
        other => panic!("expected missing token, got {other:?}"),
    }
    match service.authenticate(Some("stale")) {
        Err(AuthError::InvalidToken) => {}
        other => panic!("expected invalid token, got {other:?}"),
    }
}
