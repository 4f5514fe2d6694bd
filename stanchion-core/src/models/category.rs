//! Topic categories.
//!
//! Every cache key is assigned a [`Category`] by substring match against a
//! fixed keyword table. The table is ordered: the first category with a
//! matching keyword wins, and keys that match nothing fall into
//! [`Category::General`]. Classification is a pure function of the key.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Category
// ============================================================================

/// Domain category a topic belongs to.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Skin care routines and products.
    Skincare,
    /// Cosmetics and makeup.
    Makeup,
    /// Clothing, outfits, accessories.
    Fashion,
    /// Recipes, restaurants, drinks.
    Food,
    /// Destinations, hotels, itineraries.
    Travel,
    /// Workouts, diet, sports.
    Fitness,
    /// Babies, kids, family.
    Parenting,
    /// Cats, dogs, pet care.
    Pets,
    /// Interior, furniture, household.
    Home,
    /// Gadgets, software, electronics.
    Tech,
    /// Money, investing, careers.
    Finance,
    /// Study, exams, languages.
    Education,
    /// Anything the table does not cover.
    #[default]
    General,
}

impl Category {
    /// Returns all categories in table order.
    pub fn all() -> &'static [Category] {
        &[
            Self::Skincare,
            Self::Makeup,
            Self::Fashion,
            Self::Food,
            Self::Travel,
            Self::Fitness,
            Self::Parenting,
            Self::Pets,
            Self::Home,
            Self::Tech,
            Self::Finance,
            Self::Education,
            Self::General,
        ]
    }

    /// Returns the stable identifier used on disk.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skincare => "skincare",
            Self::Makeup => "makeup",
            Self::Fashion => "fashion",
            Self::Food => "food",
            Self::Travel => "travel",
            Self::Fitness => "fitness",
            Self::Parenting => "parenting",
            Self::Pets => "pets",
            Self::Home => "home",
            Self::Tech => "tech",
            Self::Finance => "finance",
            Self::Education => "education",
            Self::General => "general",
        }
    }

    /// Keywords that map a topic to this category.
    fn keywords(&self) -> &'static [&'static str] {
        match self {
            Self::Skincare => &[
                "skincare", "skin care", "sunscreen", "spf", "moisturizer", "serum", "toner",
                "cleanser", "retinol", "acne", "护肤", "防晒", "面霜", "精华", "水乳",
            ],
            Self::Makeup => &[
                "makeup", "lipstick", "foundation", "concealer", "eyeshadow", "mascara",
                "blush", "彩妆", "口红", "粉底", "眼影",
            ],
            Self::Fashion => &[
                "fashion", "outfit", "dress", "sneaker", "handbag", "jeans", "coat", "穿搭",
                "衣服", "鞋", "包包",
            ],
            Self::Food => &[
                "recipe", "food", "restaurant", "coffee", "milk tea", "dessert", "baking",
                "美食", "菜谱", "餐厅", "咖啡", "甜品",
            ],
            Self::Travel => &[
                "travel", "trip", "hotel", "itinerary", "flight", "beach", "旅行", "旅游",
                "酒店", "攻略",
            ],
            Self::Fitness => &[
                "fitness", "workout", "gym", "yoga", "running", "diet", "protein", "健身",
                "减肥", "瑜伽", "跑步",
            ],
            Self::Parenting => &[
                "baby", "parenting", "toddler", "stroller", "diaper", "育儿", "宝宝", "母婴",
            ],
            Self::Pets => &[
                "cats", "dogs", "puppy", "kitten", "pets", "pet food", "猫", "狗", "宠物",
            ],
            Self::Home => &[
                "home", "interior", "furniture", "sofa", "kitchen", "decor", "家居", "装修",
                "收纳",
            ],
            Self::Tech => &[
                "phone", "laptop", "gadget", "headphone", "camera", "tablet", "数码",
                "手机", "电脑", "耳机",
            ],
            Self::Finance => &[
                "finance", "invest", "stock market", "index fund", "salary", "savings", "理财",
                "基金", "股票", "工资",
            ],
            Self::Education => &[
                "study", "exam", "english", "course", "university", "language", "学习", "考试",
                "考研", "英语",
            ],
            Self::General => &[],
        }
    }

    /// Classifies a key into a category.
    ///
    /// Matching is case-insensitive substring search over the keyword table,
    /// in table order.
    pub fn classify(key: &str) -> Category {
        let normalized = key.trim().to_lowercase();
        if normalized.is_empty() {
            return Self::General;
        }

        Self::all()
            .iter()
            .copied()
            .find(|category| {
                category
                    .keywords()
                    .iter()
                    .any(|keyword| normalized.contains(keyword))
            })
            .unwrap_or(Self::General)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_exact_keyword() {
        assert_eq!(Category::classify("skincare"), Category::Skincare);
        assert_eq!(Category::classify("sunscreen"), Category::Skincare);
        assert_eq!(Category::classify("lipstick"), Category::Makeup);
    }

    #[test]
    fn test_classify_substring_and_case() {
        assert_eq!(Category::classify("Best SUNSCREEN for summer"), Category::Skincare);
        assert_eq!(Category::classify("weekend trip to Kyoto"), Category::Travel);
    }

    #[test]
    fn test_classify_cjk_keywords() {
        assert_eq!(Category::classify("夏季防晒推荐"), Category::Skincare);
        assert_eq!(Category::classify("猫粮测评"), Category::Pets);
    }

    #[test]
    fn test_classify_default() {
        assert_eq!(Category::classify("quantum chromodynamics"), Category::General);
        assert_eq!(Category::classify("   "), Category::General);
    }

    #[test]
    fn test_table_order_wins() {
        // "serum" (skincare) precedes "foundation" (makeup) in table order.
        assert_eq!(Category::classify("foundation serum"), Category::Skincare);
    }

    #[test]
    fn test_short_words_do_not_leak() {
        assert_eq!(Category::classify("education reform"), Category::General);
        assert_eq!(Category::classify("happy refund"), Category::General);
    }

    #[test]
    fn test_classify_is_deterministic() {
        for key in ["sunscreen", "gym playlist", "", "random words"] {
            assert_eq!(Category::classify(key), Category::classify(key));
        }
    }
}
