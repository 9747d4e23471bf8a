use serde::Serialize;
use utoipa::ToSchema;

use crate::category;

#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryNode {
    pub id: u32,
    pub name: String,
    pub parent: Option<u32>,
    /// Names from the top level down to this category.
    pub path: Vec<String>,
    pub children: Vec<u32>,
}

impl CategoryNode {
    pub fn lookup(id: u32) -> Option<Self> {
        let path: Vec<String> = category::id_to_category(id)
            .into_iter()
            .map(str::to_string)
            .collect();
        let name = path.last()?.clone();
        Some(Self {
            id,
            name,
            parent: category::parent(id),
            path,
            children: category::subcategories(id),
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryList {
    pub items: Vec<CategoryNode>,
}
