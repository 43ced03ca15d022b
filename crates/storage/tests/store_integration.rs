use prep_core::model::{ContentId, CourseId, ProgressRecord, ProgressStatus, UserId};
use prep_core::time::fixed_now;
use storage::repository::{InMemoryStore, ProgressPatch, ProgressStore};

fn user() -> UserId {
    UserId::new("u1")
}

#[tokio::test]
async fn full_then_partial_patches_round_trip() {
    let store = InMemoryStore::new();
    let content = ContentId::new("t1");

    let mut record = ProgressRecord::started_topic(
        user(),
        content.clone(),
        Some(CourseId::new("courseA")),
        None,
        fixed_now(),
    );
    store
        .upsert(&user(), &content, &ProgressPatch::full(&record))
        .await
        .unwrap();

    record.apply_topic_update(100, 30, fixed_now()).unwrap();
    let patch = ProgressPatch {
        status: Some(record.status()),
        completion_percent: Some(record.completion_percent()),
        time_spent_seconds: Some(record.time_spent_seconds()),
        last_accessed_at: Some(record.last_accessed_at()),
        ..ProgressPatch::default()
    };
    store.upsert(&user(), &content, &patch).await.unwrap();

    let records = store.load_all(&user()).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0], record);
}

// Remote writes may land out of order; because each write is a field
// subset, a late-arriving patch must not clobber fields it does not
// carry.
#[tokio::test]
async fn out_of_order_merges_leave_unrelated_fields_intact() {
    let store = InMemoryStore::new();
    let content = ContentId::new("t1");

    let record = ProgressRecord::started_topic(
        user(),
        content.clone(),
        Some(CourseId::new("courseA")),
        None,
        fixed_now(),
    );
    store
        .upsert(&user(), &content, &ProgressPatch::full(&record))
        .await
        .unwrap();

    // second update lands first
    let second = ProgressPatch {
        status: Some(ProgressStatus::Completed),
        completion_percent: Some(100),
        ..ProgressPatch::default()
    };
    store.upsert(&user(), &content, &second).await.unwrap();

    // first update (time only) lands late
    let first = ProgressPatch {
        time_spent_seconds: Some(45),
        ..ProgressPatch::default()
    };
    store.upsert(&user(), &content, &first).await.unwrap();

    let records = store.load_all(&user()).await.unwrap();
    assert_eq!(records[0].completion_percent(), 100);
    assert_eq!(records[0].time_spent_seconds(), 45);
    assert_eq!(records[0].course_id(), Some(&CourseId::new("courseA")));
}

#[tokio::test]
async fn duplicate_question_writes_are_merge_overwrites() {
    let store = InMemoryStore::new();
    let content = ContentId::new("q1");

    let record = ProgressRecord::answered_question(
        user(),
        content.clone(),
        false,
        8,
        None,
        fixed_now(),
    );
    store
        .upsert(&user(), &content, &ProgressPatch::full(&record))
        .await
        .unwrap();

    let retake = ProgressRecord::answered_question(
        user(),
        content.clone(),
        true,
        5,
        None,
        fixed_now(),
    );
    store
        .upsert(&user(), &content, &ProgressPatch::full(&retake))
        .await
        .unwrap();

    let records = store.load_all(&user()).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].correct(), Some(true));
}
