use serde::{Deserialize, Serialize};

use crate::search::SearchFields;
use crate::store::{Model, Record};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub about_me: Option<String>,
    pub last_seen: Option<String>,
    pub created_at: String,
}

impl Record for User {
    fn entity_type(&self) -> &'static str {
        Self::ENTITY_TYPE
    }

    fn id(&self) -> i64 {
        self.id
    }
}

impl Model for User {
    const TABLE: &'static str = "users";
    const ENTITY_TYPE: &'static str = "user";
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Recipe {
    pub id: i64,
    pub title: String,
    pub method: Option<String>,
    /// Stored image file name inside the upload directory
    pub image: Option<String>,
    pub timestamp: String,
    pub user_id: i64,
}

/// Recipes are indexed by title
impl Record for Recipe {
    fn entity_type(&self) -> &'static str {
        Self::ENTITY_TYPE
    }

    fn id(&self) -> i64 {
        self.id
    }

    fn is_searchable(&self) -> bool {
        true
    }

    fn searchable_fields(&self) -> Option<SearchFields> {
        let mut fields = SearchFields::new();
        fields.insert("title".to_string(), self.title.clone());
        Some(fields)
    }
}

impl Model for Recipe {
    const TABLE: &'static str = "recipes";
    const ENTITY_TYPE: &'static str = "recipe";
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Ingredient {
    pub id: i64,
    pub description: String,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub timestamp: String,
    pub recipe_id: i64,
}

impl Record for Ingredient {
    fn entity_type(&self) -> &'static str {
        Self::ENTITY_TYPE
    }

    fn id(&self) -> i64 {
        self.id
    }
}

impl Model for Ingredient {
    const TABLE: &'static str = "ingredients";
    const ENTITY_TYPE: &'static str = "ingredient";
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Session {
    pub id: String,
    pub user_id: i64,
    pub expires_at: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRecipeRequest {
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRecipeRequest {
    pub title: Option<String>,
    pub method: Option<String>,
}

/// Quantity arrives as raw form text and is validated before parsing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateIngredientRequest {
    pub description: String,
    #[serde(default)]
    pub quantity: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
}

/// Recipe with its ingredients and author name
#[derive(Debug, Clone, Serialize)]
pub struct RecipeDetail {
    #[serde(flatten)]
    pub recipe: Recipe,
    pub author: String,
    pub ingredients: Vec<Ingredient>,
}

/// One page of a listing
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub next_page: Option<u32>,
    pub prev_page: Option<u32>,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: u64, page: u32, per_page: u32) -> Self {
        let next_page = if total > page as u64 * per_page as u64 {
            Some(page + 1)
        } else {
            None
        };
        let prev_page = if page > 1 { Some(page - 1) } else { None };
        Self {
            items,
            total,
            page,
            per_page,
            next_page,
            prev_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipe(title: &str) -> Recipe {
        Recipe {
            id: 7,
            title: title.to_string(),
            method: Some("mix".to_string()),
            image: None,
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            user_id: 1,
        }
    }

    #[test]
    fn test_recipe_projects_title_only() {
        let r = recipe("Pancakes");
        assert!(r.is_searchable());
        let fields = r.searchable_fields().unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields.get("title").map(String::as_str), Some("Pancakes"));
        assert_eq!(r.entity_type(), "recipe");
    }

    #[test]
    fn test_ingredient_not_searchable() {
        let i = Ingredient {
            id: 1,
            description: "flour".to_string(),
            quantity: Some(200.0),
            unit: Some("g".to_string()),
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            recipe_id: 7,
        };
        assert!(!i.is_searchable());
        assert!(i.searchable_fields().is_none());
    }

    #[test]
    fn test_pagination_links() {
        let p = Paginated::new(vec![1, 2, 3, 4, 5], 12, 1, 5);
        assert_eq!(p.next_page, Some(2));
        assert_eq!(p.prev_page, None);

        let p = Paginated::new(vec![11, 12], 12, 3, 5);
        assert_eq!(p.next_page, None);
        assert_eq!(p.prev_page, Some(2));

        let p: Paginated<i32> = Paginated::new(vec![], 10, 2, 5);
        assert_eq!(p.next_page, None);
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let u = User {
            id: 1,
            username: "susan".to_string(),
            email: "susan@example.com".to_string(),
            password_hash: "secret".to_string(),
            about_me: None,
            last_seen: None,
            created_at: "2024-01-01T00:00:00Z".to_string(),
        };
        let json = serde_json::to_value(&u).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["username"], "susan");
    }
}
