use std::sync::Arc;

use jsdbg_breakpoints::{entry_breakpoint_pattern, EntryBreakpointRegistry};
use jsdbg_cdp::mock::{MockCall, MockDebugger, SetBreakpointMode};
use pretty_assertions::assert_eq;

use super::support::canonical;

fn set_breakpoint_calls(mock: &MockDebugger) -> usize {
    mock.calls()
        .iter()
        .filter(|call| matches!(call, MockCall::SetBreakpointByUrl(_)))
        .count()
}

#[tokio::test]
async fn files_with_the_same_stem_share_one_breakpoint() {
    let mock = Arc::new(MockDebugger::new());
    let registry = EntryBreakpointRegistry::new(mock.clone());

    let first = registry.add("/work/a/index.ts").await.unwrap();
    let second = registry.add("/work/a/index.js").await.unwrap();
    assert_eq!(first, second);
    // Asking again for a pending file is a no-op.
    assert_eq!(registry.add("/work/a/index.ts").await, Some(first.clone()));

    assert_eq!(set_breakpoint_calls(&mock), 1);
    let installed = mock.installed_breakpoints();
    assert_eq!(installed.len(), 1);
    let params = installed.get(&first).unwrap();
    assert_eq!(params.url_regex, entry_breakpoint_pattern("/work/a/index.ts"));
    assert_eq!((params.line_number, params.column_number), (0, 0));

    let records = registry.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].pending.len(), 2);
    assert_eq!(registry.index_sizes().await, (2, 1, 1));
    assert!(registry.has_pending(&canonical("/work/a/index.js")).await);
}

#[tokio::test]
async fn breakpoint_is_removed_once_every_file_was_hit() {
    let mock = Arc::new(MockDebugger::new());
    let registry = EntryBreakpointRegistry::new(mock.clone());
    let id = registry.add("/work/a/index.ts").await.unwrap();
    registry.add("/work/a/index.js").await.unwrap();

    assert!(registry.resolve_hit(&id, &canonical("/work/a/index.ts")).await);
    assert!(mock.removed_breakpoints().is_empty());
    assert!(registry.contains_breakpoint(&id).await);

    assert!(registry.resolve_hit(&id, &canonical("/work/a/index.js")).await);
    assert_eq!(mock.removed_breakpoints(), vec![id.clone()]);
    assert!(mock.installed_breakpoints().is_empty());
    assert!(registry.is_empty().await);
    assert_eq!(registry.index_sizes().await, (0, 0, 0));

    // Already gone: nothing further to do engine-side.
    assert!(!registry.resolve_hit(&id, &canonical("/work/a/index.js")).await);
    assert_eq!(mock.removed_breakpoints().len(), 1);
}

#[tokio::test]
async fn distinct_stems_get_distinct_breakpoints() {
    let mock = Arc::new(MockDebugger::new());
    let registry = EntryBreakpointRegistry::new(mock.clone());

    let a = registry.add("/work/src/app.ts").await.unwrap();
    let b = registry.add("/work/src/util.ts").await.unwrap();
    assert_ne!(a, b);
    assert_eq!(registry.index_sizes().await, (2, 2, 2));

    // A hit reported for a file the record does not track changes nothing.
    assert!(!registry.resolve_hit(&a, &canonical("/work/src/util.ts")).await);
    assert_eq!(registry.index_sizes().await, (2, 2, 2));
}

#[tokio::test]
async fn install_failures_leave_no_record() {
    for mode in [SetBreakpointMode::NoId, SetBreakpointMode::Fail] {
        let mock = Arc::new(MockDebugger::new());
        mock.set_breakpoint_mode(mode);
        let registry = EntryBreakpointRegistry::new(mock.clone());

        assert_eq!(registry.add("/work/a/index.ts").await, None);
        assert!(registry.is_empty().await);
        assert!(!registry.has_pending(&canonical("/work/a/index.ts")).await);
        assert_eq!(registry.index_sizes().await, (0, 0, 0));

        // Later requests try again.
        mock.set_breakpoint_mode(SetBreakpointMode::Succeed);
        assert!(registry.add("/work/a/index.ts").await.is_some());
        assert_eq!(set_breakpoint_calls(&mock), 2);
    }
}
