//! Fixed three-level category taxonomy.
//!
//! Codes are three-digit numbers. A top-level code is `X00`; its children are
//! either `X0Y` (leaf second level) or `XY0` (second level that has its own
//! children `XYZ`). Parentage is read from the digits of the code, so adding a
//! category means editing the tables below.

/// `(id, name)` of every top-level category.
const TOP_LEVEL: &[(u32, &str)] = &[
    (100, "CD, DVD, ブルーレイ"),
    (200, "本, 雑誌, 漫画"),
    (300, "スマホ, タブレット, PC"),
    (400, "家電, カメラ, AV機器"),
    (999, "その他"),
];

/// `(parent, id, name)` of every second-level category.
const SECOND_LEVEL: &[(u32, u32, &str)] = &[
    (100, 101, "CD"),
    (100, 102, "DVD"),
    (100, 103, "ブルーレイ"),
    (100, 104, "レコード"),
    (100, 105, "テープ"),
    (200, 201, "本"),
    (200, 202, "雑誌"),
    (200, 203, "漫画"),
    (200, 204, "文庫"),
    (200, 205, "新書"),
    (200, 206, "絵本"),
    (300, 310, "スマホ・携帯"),
    (300, 320, "タブレット"),
    (300, 330, "PC"),
    (300, 340, "PC周辺機器"),
    (400, 410, "家電"),
    (400, 420, "カメラ"),
    (400, 430, "AV機器"),
];

/// `(parent, id, name)` of every third-level category.
const THIRD_LEVEL: &[(u32, u32, &str)] = &[
    (310, 311, "スマートフォン本体"),
    (310, 312, "スマートフォンアクセサリ"),
    (310, 313, "SIMカード"),
    (320, 321, "タブレット本体"),
    (320, 322, "タブレットアクセサリ"),
    (330, 331, "ノートPC"),
    (330, 332, "デスクトップPC"),
    (340, 341, "モニター"),
    (340, 342, "キーボード"),
    (340, 343, "マウス"),
    (410, 411, "テレビ"),
    (410, 412, "エアコン"),
    (410, 413, "冷蔵庫"),
    (420, 421, "デジタルカメラ"),
    (420, 422, "ビデオカメラ"),
    (420, 423, "レンズ"),
    (430, 431, "プロジェクター"),
    (430, 432, "スピーカー"),
    (430, 433, "アンプ"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Category {
    pub id: u32,
    pub name: &'static str,
}

fn top_name(id: u32) -> Option<&'static str> {
    TOP_LEVEL.iter().find(|(i, _)| *i == id).map(|(_, n)| *n)
}

fn child_name(table: &[(u32, u32, &'static str)], parent: u32, id: u32) -> Option<&'static str> {
    table
        .iter()
        .find(|(p, i, _)| *p == parent && *i == id)
        .map(|(_, _, n)| *n)
}

fn in_table(table: &[(u32, u32, &'static str)], id: u32) -> bool {
    table.iter().any(|(_, i, _)| *i == id)
}

/// `X00` for any three-digit code.
fn top_of(id: u32) -> u32 {
    id / 100 * 100
}

/// `XY0` for any three-digit code.
fn middle_of(id: u32) -> u32 {
    id / 10 * 10
}

fn is_three_digit(id: u32) -> bool {
    (100..=999).contains(&id)
}

/// Names from the top-level ancestor down to `id`; empty when `id` is unknown.
pub fn id_to_category(id: u32) -> Vec<&'static str> {
    if let Some(name) = top_name(id) {
        return vec![name];
    }
    if !is_three_digit(id) {
        return Vec::new();
    }
    let top = top_of(id);
    let Some(top_label) = top_name(top) else {
        return Vec::new();
    };
    if let Some(name) = child_name(SECOND_LEVEL, top, id) {
        return vec![top_label, name];
    }
    let middle = middle_of(id);
    match (
        child_name(SECOND_LEVEL, top, middle),
        child_name(THIRD_LEVEL, middle, id),
    ) {
        (Some(middle_label), Some(name)) => vec![top_label, middle_label, name],
        _ => Vec::new(),
    }
}

/// First category whose name matches, searching top, second, then third level.
pub fn category_to_id(name: &str) -> Option<u32> {
    TOP_LEVEL
        .iter()
        .find(|(_, n)| *n == name)
        .map(|(id, _)| *id)
        .or_else(|| {
            SECOND_LEVEL
                .iter()
                .chain(THIRD_LEVEL.iter())
                .find(|(_, _, n)| *n == name)
                .map(|(_, id, _)| *id)
        })
}

pub fn name(id: u32) -> Option<&'static str> {
    id_to_category(id).last().copied()
}

pub fn is_known(id: u32) -> bool {
    !id_to_category(id).is_empty()
}

/// Direct children of `id`.
pub fn subcategories(id: u32) -> Vec<u32> {
    SECOND_LEVEL
        .iter()
        .chain(THIRD_LEVEL.iter())
        .filter(|(parent, _, _)| *parent == id)
        .map(|(_, child, _)| *child)
        .collect()
}

pub fn has_subcategories(id: u32) -> bool {
    !subcategories(id).is_empty()
}

pub fn parent(id: u32) -> Option<u32> {
    if in_table(SECOND_LEVEL, id) {
        Some(top_of(id))
    } else if in_table(THIRD_LEVEL, id) {
        Some(middle_of(id))
    } else {
        None
    }
}

pub fn top_level() -> Vec<Category> {
    TOP_LEVEL
        .iter()
        .map(|(id, name)| Category { id: *id, name })
        .collect()
}

/// Every known category, top levels first.
pub fn all() -> Vec<Category> {
    let mut out = top_level();
    out.extend(
        SECOND_LEVEL
            .iter()
            .chain(THIRD_LEVEL.iter())
            .map(|(_, id, name)| Category { id: *id, name }),
    );
    out
}

/// `id` followed by every code beneath it.
pub fn descendants(id: u32) -> Vec<u32> {
    let mut out = vec![id];
    let mut i = 0;
    while i < out.len() {
        out.extend(subcategories(out[i]));
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_entry_round_trips_through_its_name() {
        for category in all() {
            let id = category_to_id(category.name).expect("name resolves");
            let chain = id_to_category(id);
            assert_eq!(chain.last(), Some(&category.name), "chain for {id}");
        }
    }

    #[test]
    fn chains_list_ancestors_first() {
        assert_eq!(id_to_category(100), vec!["CD, DVD, ブルーレイ"]);
        assert_eq!(id_to_category(102), vec!["CD, DVD, ブルーレイ", "DVD"]);
        assert_eq!(
            id_to_category(342),
            vec!["スマホ, タブレット, PC", "PC周辺機器", "キーボード"]
        );
        assert_eq!(id_to_category(999), vec!["その他"]);
    }

    #[test]
    fn unknown_codes_resolve_to_nothing() {
        assert!(id_to_category(0).is_empty());
        assert!(id_to_category(107).is_empty());
        assert!(id_to_category(350).is_empty());
        assert!(id_to_category(1001).is_empty());
        assert_eq!(category_to_id("レコードプレーヤー"), None);
        assert!(!is_known(500));
    }

    #[test]
    fn parents_and_children_follow_the_digits() {
        assert_eq!(parent(101), Some(100));
        assert_eq!(parent(320), Some(300));
        assert_eq!(parent(423), Some(420));
        assert_eq!(parent(100), None);
        assert_eq!(subcategories(330), vec![331, 332]);
        assert_eq!(subcategories(100), vec![101, 102, 103, 104, 105]);
        assert!(has_subcategories(410));
        assert!(!has_subcategories(101));
        assert!(!has_subcategories(999));
    }

    #[test]
    fn descendants_cover_the_whole_subtree() {
        let under_pc = descendants(300);
        assert_eq!(under_pc[0], 300);
        for code in [310, 311, 313, 340, 343] {
            assert!(under_pc.contains(&code), "missing {code}");
        }
        assert!(!under_pc.contains(&410));
        assert_eq!(descendants(101), vec![101]);
    }
}
