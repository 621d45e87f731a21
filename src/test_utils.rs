//! テスト用のツリー構築ヘルパー
#![cfg(test)]
#![allow(clippy::panic)]

use crate::hash::FingerprintCache;
use crate::link::{
    LinkResolver,
    WeblateLinks,
};
use crate::tree::{
    NodeId,
    Tree,
};

/// 新しいドキュメントに `<html><head></head><body></body></html>` を作成
///
/// # Returns
/// `(document, body)`
pub(crate) fn new_document(tree: &mut Tree) -> (NodeId, NodeId) {
    let document = tree.create_document();
    let html = append_element(tree, document, "html", &[]);
    append_element(tree, html, "head", &[]);
    let body = append_element(tree, html, "body", &[]);
    (document, body)
}

/// `parent` の下に属性付きの要素を追加
pub(crate) fn append_element(
    tree: &mut Tree,
    parent: NodeId,
    tag: &str,
    attributes: &[(&str, &str)],
) -> NodeId {
    let element = tree.create_element(tag);
    for (name, value) in attributes {
        tree.set_attribute(element, name, *value);
    }
    tree.append_child(parent, element).unwrap_or_else(|e| panic!("append {tag}: {e}"));
    element
}

/// `parent` の下にテキストノードを追加
pub(crate) fn append_text(tree: &mut Tree, parent: NodeId, data: &str) -> NodeId {
    let text = tree.create_text(data);
    tree.append_child(parent, text).unwrap_or_else(|e| panic!("append text: {e}"));
    text
}

/// `fr_BE`・バージョン 17.0 の Weblate リンク
pub(crate) fn test_links() -> LinkResolver {
    LinkResolver::new(
        FingerprintCache::default(),
        Box::new(WeblateLinks::new(
            "https://translate.odoo.com/translate/odoo-".to_string(),
            Default::default(),
        )),
        "fr_BE",
        "17.0",
    )
}
