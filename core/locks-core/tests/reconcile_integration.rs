//! Integration tests for the reconciliation controller.
//!
//! These tests verify:
//! - Concurrent refreshes of one root share a single fetch
//! - Resolution failures never reach the authority
//! - Mutations are always followed by a refresh, even when rejected
//! - Concurrent mutations converge on the authority's final state
//! - A failed refresh keeps the previous snapshot

mod common;

use std::path::Path;
use std::sync::{Arc, Mutex};

use common::{FakeAuthority, MemoryFiles, PhaseLog};
use lfs_locks_core::{
    ControllerState, LockError, LockStateStore, ReconciliationController, WorkspaceContext,
};

const ROOT: &str = "/repo";

fn controller(
    authority: &FakeAuthority,
    files: MemoryFiles,
) -> ReconciliationController<FakeAuthority, MemoryFiles> {
    ReconciliationController::new(authority.clone(), files, LockStateStore::new())
}

fn workspace() -> WorkspaceContext {
    WorkspaceContext::new(ROOT)
}

fn report_files() -> MemoryFiles {
    MemoryFiles::new()
        .with_file(
            "/repo/src/Invoice.al",
            "report 50100 Invoice\n{\n    RDLCLayout = './layouts/Invoice.rdl';\n}\n",
        )
        .with_file("/repo/layouts/Invoice.rdl", "<Report/>")
        .with_file("/repo/src/Broken.al", "report 50101 Broken { LayoutFile = 'layouts/Gone.rdl'; }")
        .with_file("/repo/src/Codeunit.al", "codeunit 50102 Helper { }")
        .with_file("/repo/assets/logo.psd", "")
}

// ============================================================================
// Refresh
// ============================================================================

#[tokio::test]
async fn test_concurrent_refreshes_share_one_fetch() {
    let authority = FakeAuthority::new();
    authority.seed("assets/logo.psd", "pete");
    let controller = controller(&authority, MemoryFiles::new());
    let root = Path::new(ROOT);

    let (first, second) = tokio::join!(controller.refresh(root), controller.refresh(root));
    let (first, second) = (first.unwrap(), second.unwrap());

    assert_eq!(authority.calls().list, 1);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(controller.store().current().version(), 1);
    assert_eq!(first.records()[0].path(), "assets/logo.psd");
}

#[tokio::test]
async fn test_sequential_refreshes_fetch_each_time() {
    let authority = FakeAuthority::new();
    let controller = controller(&authority, MemoryFiles::new());
    let root = Path::new(ROOT);

    controller.refresh(root).await.unwrap();
    controller.refresh(root).await.unwrap();

    assert_eq!(authority.calls().list, 2);
    assert_eq!(controller.store().current().version(), 2);
}

#[tokio::test]
async fn test_empty_authority_yields_empty_snapshot() {
    let authority = FakeAuthority::new();
    let controller = controller(&authority, MemoryFiles::new());

    let snapshot = controller.refresh(Path::new(ROOT)).await.unwrap();
    assert!(snapshot.is_empty());
    assert_eq!(snapshot.root(), Some(Path::new(ROOT)));
}

#[tokio::test]
async fn test_failed_refresh_keeps_previous_snapshot() {
    let authority = FakeAuthority::new();
    authority.seed("assets/logo.psd", "pete");
    let controller = controller(&authority, MemoryFiles::new());
    let root = Path::new(ROOT);

    let swaps = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&swaps);
    let _sub = controller
        .store()
        .subscribe(move |_| *counter.lock().unwrap() += 1);

    controller.refresh(root).await.unwrap();
    authority.set_fail_list(true);
    let err = controller.refresh(root).await.unwrap_err();

    assert!(matches!(err, LockError::CommandFailed { .. }));
    let current = controller.store().current();
    assert_eq!(current.version(), 1);
    assert!(current.find_by_path("assets/logo.psd").is_some());
    assert_eq!(*swaps.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_unavailable_authority_fails_refresh_without_listing() {
    let authority = FakeAuthority::new();
    authority.set_available(false);
    let controller = controller(&authority, MemoryFiles::new());
    let phases = PhaseLog::default();

    let err = controller
        .reconcile(Path::new(ROOT), &phases)
        .await
        .unwrap_err();

    assert!(matches!(err, LockError::AuthorityUnavailable { .. }));
    assert_eq!(authority.calls().list, 0);
    assert_eq!(phases.states()[0], ControllerState::Fetching);
    assert!(matches!(phases.last(), Some(ControllerState::Error(_))));
}

// ============================================================================
// Lock
// ============================================================================

#[tokio::test]
async fn test_lock_redirects_to_layout_file() {
    let authority = FakeAuthority::new();
    let controller = controller(&authority, report_files());
    let phases = PhaseLog::default();

    let (target, report) = controller
        .request_lock(&workspace(), Path::new("/repo/src/Invoice.al"), &phases)
        .await
        .unwrap();

    assert_eq!(target.path, "layouts/Invoice.rdl");
    assert_eq!(target.reference.as_deref(), Some("layouts/Invoice.rdl"));
    assert_eq!(report.command_line, "git lfs lock \"layouts/Invoice.rdl\"");
    assert!(report.succeeded());

    let snapshot = report.refresh.unwrap();
    assert!(snapshot.find_by_path("layouts/Invoice.rdl").is_some());
    assert!(snapshot.find_by_path("src/Invoice.al").is_none());
    assert_eq!(authority.calls().acquire, 1);
    assert_eq!(
        phases.states(),
        [
            ControllerState::Resolving,
            ControllerState::Mutating,
            ControllerState::Fetching,
            ControllerState::Idle,
        ]
    );
}

#[tokio::test]
async fn test_plain_file_locks_itself() {
    let authority = FakeAuthority::new();
    let controller = controller(&authority, report_files());

    let (target, report) = controller
        .request_lock(&workspace(), Path::new("/repo/assets/logo.psd"), &())
        .await
        .unwrap();

    assert!(!target.is_redirected());
    assert_eq!(target.path, "assets/logo.psd");
    assert!(report.succeeded());
    assert_eq!(authority.locked_paths(), ["assets/logo.psd"]);
}

#[tokio::test]
async fn test_missing_reference_makes_no_authority_calls() {
    let authority = FakeAuthority::new();
    let controller = controller(&authority, report_files());
    let phases = PhaseLog::default();

    let err = controller
        .request_lock(&workspace(), Path::new("/repo/src/Broken.al"), &phases)
        .await
        .unwrap_err();

    match err {
        LockError::ReferenceMissing { reference, .. } => {
            assert_eq!(reference, "layouts/Gone.rdl")
        }
        other => panic!("expected ReferenceMissing, got {:?}", other),
    }
    assert_eq!(authority.calls().total(), 0);
    assert_eq!(phases.states()[0], ControllerState::Resolving);
    assert!(matches!(phases.last(), Some(ControllerState::Error(_))));
}

#[tokio::test]
async fn test_source_without_reference_is_not_redirected() {
    let authority = FakeAuthority::new();
    let controller = controller(&authority, report_files());

    let err = controller
        .request_lock(&workspace(), Path::new("/repo/src/Codeunit.al"), &())
        .await
        .unwrap_err();

    assert!(matches!(err, LockError::NotRedirected(_)));
    assert_eq!(authority.calls().total(), 0);
}

#[tokio::test]
async fn test_file_outside_root_is_a_path_error() {
    let authority = FakeAuthority::new();
    let controller = controller(&authority, report_files());

    let err = controller
        .request_lock(&workspace(), Path::new("/elsewhere/logo.psd"), &())
        .await
        .unwrap_err();

    assert!(matches!(err, LockError::PathDomain { .. }));
    assert_eq!(authority.calls().total(), 0);
}

#[tokio::test]
async fn test_unavailable_authority_short_circuits_mutation() {
    let authority = FakeAuthority::new();
    authority.set_available(false);
    let controller = controller(&authority, report_files());

    let err = controller
        .request_lock(&workspace(), Path::new("/repo/assets/logo.psd"), &())
        .await
        .unwrap_err();

    assert!(matches!(err, LockError::AuthorityUnavailable { .. }));
    let calls = authority.calls();
    assert_eq!(calls.acquire, 0);
    assert_eq!(calls.list, 0);
}

#[tokio::test]
async fn test_conflict_is_reported_and_still_refreshes() {
    let authority = FakeAuthority::new();
    authority.seed("assets/logo.psd", "someone-else");
    let controller = controller(&authority, report_files());
    let phases = PhaseLog::default();

    let (_, report) = controller
        .request_lock(&workspace(), Path::new("/repo/assets/logo.psd"), &phases)
        .await
        .unwrap();

    match &report.mutation {
        Err(LockError::LockConflict { message }) => assert_eq!(message, "Lock exists"),
        other => panic!("expected conflict, got {:?}", other),
    }
    assert_eq!(authority.calls().list, 1);
    let snapshot = report.refresh.unwrap();
    assert_eq!(
        snapshot.find_by_path("assets/logo.psd").map(|r| r.owner_name()),
        Some("someone-else")
    );
    assert!(matches!(phases.last(), Some(ControllerState::Error(_))));
}

// ============================================================================
// Unlock
// ============================================================================

#[tokio::test]
async fn test_release_by_id_removes_lock() {
    let authority = FakeAuthority::new();
    let id = authority.seed("assets/logo.psd", "pete");
    authority.seed("layouts/Invoice.rdl", "pete");
    let controller = controller(&authority, MemoryFiles::new());

    controller.refresh(Path::new(ROOT)).await.unwrap();
    let report = controller
        .request_unlock(&workspace(), &id, false, &())
        .await
        .unwrap();

    assert_eq!(report.command_line, format!("git lfs unlock --id={}", id));
    let snapshot = report.refresh.unwrap();
    assert!(snapshot.find_by_id(&id).is_none());
    assert_eq!(snapshot.len(), 1);
    assert_eq!(controller.store().current().version(), 2);
}

#[tokio::test]
async fn test_unlock_file_follows_layout_reference() {
    let authority = FakeAuthority::new();
    authority.seed("layouts/Invoice.rdl", "pete");
    let controller = controller(&authority, report_files());

    let (target, report) = controller
        .request_unlock_file(&workspace(), Path::new("/repo/src/Invoice.al"), true, &())
        .await
        .unwrap();

    assert_eq!(target.path, "layouts/Invoice.rdl");
    assert_eq!(
        report.command_line,
        "git lfs unlock \"layouts/Invoice.rdl\" --force"
    );
    assert!(report.refresh.unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_lock_id_is_a_conflict() {
    let authority = FakeAuthority::new();
    let controller = controller(&authority, MemoryFiles::new());

    let report = controller
        .request_unlock(&workspace(), "999", false, &())
        .await
        .unwrap();

    assert!(!report.succeeded());
    assert!(report.refresh.is_ok());
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test]
async fn test_concurrent_mutations_converge() {
    let authority = FakeAuthority::new();
    let id = authority.seed("old/retired.psd", "pete");
    let files = report_files().with_file("/repo/assets/banner.psd", "");
    let controller = controller(&authority, files);
    let ctx = workspace();

    let (first, second, third) = tokio::join!(
        controller.request_lock(&ctx, Path::new("/repo/assets/logo.psd"), &()),
        controller.request_lock(&ctx, Path::new("/repo/src/Invoice.al"), &()),
        controller.request_unlock(&ctx, &id, false, &()),
    );
    assert!(first.unwrap().1.succeeded());
    assert!(second.unwrap().1.succeeded());
    assert!(third.unwrap().succeeded());

    let mut final_paths: Vec<String> = controller
        .store()
        .current()
        .records()
        .iter()
        .map(|r| r.path().to_string())
        .collect();
    final_paths.sort();
    let mut expected = authority.locked_paths();
    expected.sort();

    assert_eq!(final_paths, expected);
    assert_eq!(final_paths, ["assets/logo.psd", "layouts/Invoice.rdl"]);
}

#[tokio::test]
async fn test_refresh_joined_during_mutation_sees_mutation() {
    let authority = FakeAuthority::new();
    let controller = controller(&authority, report_files());
    let root = Path::new(ROOT);
    let ctx = workspace();

    // The refresh starts listing before the lock lands; the lock's own refresh
    // must not be satisfied by that stale listing.
    let (stale, locked) = tokio::join!(
        controller.refresh(root),
        controller.request_lock(&ctx, Path::new("/repo/assets/logo.psd"), &()),
    );

    assert!(stale.unwrap().is_empty());
    let snapshot = locked.unwrap().1.refresh.unwrap();
    assert!(snapshot.find_by_path("assets/logo.psd").is_some());
    assert!(controller
        .store()
        .current()
        .find_by_path("assets/logo.psd")
        .is_some());
}
