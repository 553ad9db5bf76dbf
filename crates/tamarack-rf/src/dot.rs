//! Graphviz rendering of trained trees.

use std::fmt::Write;

use crate::classifier::TreeClassifier;
use crate::value::Value;

/// Render a tree as a Graphviz digraph.
///
/// One box-shaped node per arena entry, labelled with the node id and its
/// mode label. Left edges carry the split condition `F<feature> < <value>`;
/// right edges are unlabelled.
#[must_use]
pub fn render<F: Value>(tree: &TreeClassifier<F>) -> String {
    let mut out = String::new();
    out.push_str("digraph G\n{\n");
    for node in 0..tree.node_count() as u32 {
        writeln!(
            out,
            "    node{node}[shape=box label=\"N{node} = {}\"]",
            tree.leaf_label(node)
        )
        .expect("writing to a string cannot fail");
        if !tree.is_leaf(node) {
            writeln!(
                out,
                "    node{node} -> node{} [label=\"F{} < {}\"];",
                tree.left_child(node),
                tree.split_feature(node),
                tree.split_value(node)
            )
            .expect("writing to a string cannot fail");
            writeln!(out, "    node{node} -> node{};", tree.right_child(node))
                .expect("writing to a string cannot fail");
        }
    }
    out.push_str("}\n");
    out
}
