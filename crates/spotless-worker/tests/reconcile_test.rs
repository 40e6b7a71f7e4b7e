mod helpers;

use helpers::{booking, document, photos, TestEnv};
use spotless_core::models::{NewJobPhoto, PhotoCategory};
use spotless_db::PhotoMetadataStore;
use spotless_storage::ObjectPathBuilder;
use spotless_worker::{OrphanReconciler, PipelineError, UploadRequest};
use std::sync::Arc;

fn reconciler(env: &TestEnv) -> OrphanReconciler {
    OrphanReconciler::new(Arc::new(env.storage.clone()), Arc::new(env.metadata.clone()))
}

#[tokio::test]
async fn test_object_without_row_is_an_orphan() {
    let env = TestEnv::new();
    let context = booking();
    let prefix = ObjectPathBuilder::category_prefix(&context, PhotoCategory::Additional);

    for name in ["1_0_a.pdf", "1_1_b.pdf", "1_2_c.pdf"] {
        env.storage.set_file(&format!("{}/{}", prefix, name), "x");
    }
    for name in ["1_0_a.pdf", "1_2_c.pdf"] {
        env.metadata
            .insert(NewJobPhoto::from_context(
                &context,
                format!("{}/{}", prefix, name),
                PhotoCategory::Additional,
                None,
            ))
            .await
            .unwrap();
    }

    let orphans = reconciler(&env).reconcile(&context).await.unwrap();

    assert_eq!(orphans.len(), 1);
    assert_eq!(orphans[0].file_path, format!("{}/1_1_b.pdf", prefix));
    assert_eq!(orphans[0].file_name, "1_1_b.pdf");
    assert_eq!(orphans[0].booking_id, context.booking_id);
    assert_eq!(orphans[0].category, PhotoCategory::Additional);
}

#[tokio::test]
async fn test_clean_upload_leaves_no_orphans() {
    let env = TestEnv::new();
    let context = booking();
    let mut request = UploadRequest::new(context.clone());
    request.before = photos("before", 2);
    request.additional = vec![document("quote.pdf", 16), document("notes.txt", 16)];

    let report = env.pipeline().upload(request, None).await;
    assert!(report.is_complete_success());

    let orphans = reconciler(&env)
        .reconcile_categories(&context, &PhotoCategory::ALL)
        .await
        .unwrap();
    assert!(orphans.is_empty());
}

#[tokio::test]
async fn test_failed_insert_is_found_by_reconcile() {
    let env = TestEnv::new();
    env.metadata.fail_inserts_containing("lost.pdf");
    let context = booking();
    let mut request = UploadRequest::new(context.clone());
    request.additional = vec![document("kept.pdf", 16), document("lost.pdf", 16)];

    env.pipeline().upload(request, None).await;

    let orphans = reconciler(&env).reconcile(&context).await.unwrap();
    assert_eq!(orphans.len(), 1);
    assert!(orphans[0].file_name.ends_with("_lost.pdf"));

    env.metadata.clear_insert_failures();
    env.metadata
        .insert(NewJobPhoto::from_context(
            &context,
            orphans[0].file_path.clone(),
            PhotoCategory::Additional,
            None,
        ))
        .await
        .unwrap();

    assert!(reconciler(&env).reconcile(&context).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unrecognized_files_are_ignored() {
    let env = TestEnv::new();
    let context = booking();
    let prefix = ObjectPathBuilder::category_prefix(&context, PhotoCategory::Additional);
    env.storage.set_file(&format!("{}/.DS_Store", prefix), "x");
    env.storage.set_file(&format!("{}/upload.part", prefix), "x");

    let orphans = reconciler(&env).reconcile(&context).await.unwrap();
    assert!(orphans.is_empty());
}

#[tokio::test]
async fn test_other_bookings_are_not_scanned() {
    let env = TestEnv::new();
    let context = booking();
    let other = booking();
    let prefix = ObjectPathBuilder::category_prefix(&other, PhotoCategory::Additional);
    env.storage.set_file(&format!("{}/1_0_x.pdf", prefix), "x");

    let orphans = reconciler(&env).reconcile(&context).await.unwrap();
    assert!(orphans.is_empty());
}

#[tokio::test]
async fn test_list_failure_is_propagated() {
    let env = TestEnv::new();
    env.storage.set_list_failure(true);

    let err = reconciler(&env).reconcile(&booking()).await.unwrap_err();
    assert!(matches!(err, PipelineError::Storage(_)));
}

#[tokio::test]
async fn test_select_failure_is_propagated() {
    let env = TestEnv::new();
    env.metadata.set_select_failure(true);

    let err = reconciler(&env).reconcile(&booking()).await.unwrap_err();
    assert!(matches!(err, PipelineError::Metadata(_)));
}
