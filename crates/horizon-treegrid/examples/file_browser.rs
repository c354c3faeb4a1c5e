//! Drives a selection model over a small mock file tree and prints the
//! published change events while the tree mutates.
//!
//! Run with `RUST_LOG=horizon_treegrid=trace` to see the internal tracing.

use std::sync::Arc;

use horizon_treegrid::{IndexPath, ObservableList, SourceRef, TreeSelectionModel};

#[derive(Clone)]
struct FsEntry {
    name: &'static str,
    children: Arc<ObservableList<FsEntry>>,
}

fn dir(name: &'static str, children: Vec<FsEntry>) -> FsEntry {
    FsEntry {
        name,
        children: Arc::new(ObservableList::new(children)),
    }
}

fn file(name: &'static str) -> FsEntry {
    dir(name, Vec::new())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "horizon_treegrid=debug".into()),
        )
        .init();

    let roots = Arc::new(ObservableList::new(vec![
        dir(
            "src",
            vec![file("lib.rs"), file("signal.rs"), file("selection.rs")],
        ),
        dir("tests", vec![file("hierarchy.rs")]),
        file("Cargo.toml"),
    ]));

    let selection = TreeSelectionModel::new(roots.clone() as SourceRef<FsEntry>, |e: &FsEntry| {
        Some(e.children.clone() as SourceRef<FsEntry>)
    });

    selection.selection_changed().connect(|change| {
        for (path, ranges) in &change.selected {
            println!("  + selected under {path:?}: {ranges:?}");
        }
        for (path, ranges) in &change.deselected {
            println!("  - deselected under {path:?}: {ranges:?}");
        }
        for item in &change.removed_items {
            println!("  x removed while selected: {}", item.name);
        }
    });

    println!("select src/signal.rs and src/selection.rs");
    selection.select_range(&IndexPath::from([0]), 1..=2);

    println!("select Cargo.toml");
    selection.select(&IndexPath::from([2]));

    println!("insert benches/ before tests/");
    roots.insert(1, dir("benches", vec![file("ranges.rs")]));
    println!(
        "  Cargo.toml now selected at {:?}",
        selection
            .selected_paths()
            .into_iter()
            .find(|p| p.depth() == 1)
    );

    println!("remove src/ (selected children are published as removed)");
    roots.remove(0);

    println!(
        "final selection: {:?} ({} items)",
        selection.selected_paths(),
        selection.count()
    );
}
