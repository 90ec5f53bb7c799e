//! Property-based test generators using proptest.
//!
//! Paths are drawn from a small fixed pool so that generated batches touch
//! the same files repeatedly, which is where ordering bugs hide.

use proptest::prelude::*;
use relay_core::FileOperation;
use std::collections::BTreeMap;

/// Paths used by the generators, including nested ones.
pub const PATH_POOL: &[&str] = &[
    "a.txt",
    "b.txt",
    "src/lib.rs",
    "src/nested/mod.rs",
    "docs/guide/intro.md",
];

/// Strategy for generating project-relative paths.
pub fn path_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(PATH_POOL).prop_map(str::to_string)
}

/// Strategy for generating multi-line file content.
pub fn content_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z ]{0,12}", 0..6).prop_map(|lines| {
        lines
            .into_iter()
            .map(|line| format!("{line}\n"))
            .collect()
    })
}

/// Strategy for generating a single operation.
pub fn file_operation_strategy() -> impl Strategy<Value = FileOperation> {
    prop_oneof![
        3 => (path_strategy(), content_strategy())
            .prop_map(|(path, content)| FileOperation::write(path, content)),
        1 => path_strategy().prop_map(FileOperation::delete),
        1 => (path_strategy(), path_strategy())
            .prop_map(|(from, to)| FileOperation::rename(from, to)),
    ]
}

/// Strategy for generating an ordered batch of operations.
pub fn operations_strategy(max_len: usize) -> impl Strategy<Value = Vec<FileOperation>> {
    prop::collection::vec(file_operation_strategy(), 1..=max_len.max(1))
}

/// Strategy for generating initial project content over [`PATH_POOL`].
pub fn file_tree_strategy() -> impl Strategy<Value = BTreeMap<String, String>> {
    prop::collection::btree_map(path_strategy(), content_strategy(), 0..PATH_POOL.len())
}
