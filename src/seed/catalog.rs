//! The boutique demonstration catalog.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::ActiveValue::{NotSet, Set};
use serde::Serialize;

use crate::entities::{category, stock_item};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CategorySeed {
    pub category_id: i32,
    pub name: &'static str,
    pub description: &'static str,
    pub image_path: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProductSeed {
    pub name: &'static str,
    pub description: &'static str,
    pub stock_quantity: i32,
    pub unit_price: Decimal,
    pub category_id: i32,
    pub image_path: &'static str,
}

pub const CATEGORIES: [CategorySeed; 5] = [
    CategorySeed {
        category_id: 1,
        name: "Skirt",
        description: "Stylish skirts for all occasions",
        image_path: "images/categories/skirt.png",
    },
    CategorySeed {
        category_id: 2,
        name: "Dress",
        description: "Elegant evening and casual dresses",
        image_path: "images/categories/dress_cat.png",
    },
    CategorySeed {
        category_id: 3,
        name: "Hijab",
        description: "Premium quality hijabs",
        image_path: "images/categories/hijab.png",
    },
    CategorySeed {
        category_id: 4,
        name: "Jacket",
        description: "Fashionable jackets and outerwear",
        image_path: "images/categories/jacket.png",
    },
    CategorySeed {
        category_id: 5,
        name: "Accessory",
        description: "Beautiful accessories and jewelry",
        image_path: "images/categories/accessory.png",
    },
];

const fn product(
    name: &'static str,
    description: &'static str,
    stock_quantity: i32,
    unit_price: Decimal,
    category_id: i32,
    image_path: &'static str,
) -> ProductSeed {
    ProductSeed {
        name,
        description,
        stock_quantity,
        unit_price,
        category_id,
        image_path,
    }
}

#[rustfmt::skip]
pub const PRODUCTS: [ProductSeed; 15] = [
    // Skirt
    product("Pleated Midi Skirt", "Elegant black pleated midi skirt", 15, dec!(89.99), 1, "images/products/skirt_1.png"),
    product("A-Line Long Skirt", "Classic beige A-line long skirt", 12, dec!(79.99), 1, "images/products/skirt_2.png"),
    product("Pencil Skirt", "Professional black pencil skirt", 20, dec!(65.00), 1, "images/products/skirt_1.png"),
    // Dress
    product("Silk Evening Dress", "Premium silk evening dress in soft pink", 10, dec!(250.00), 2, "images/products/dress_1.png"),
    product("Emerald Green Dress", "Elegant emerald green satin dress", 8, dec!(280.00), 2, "images/products/green_dress.png"),
    product("Classic Beige Dress", "Timeless beige long dress", 15, dec!(199.00), 2, "images/products/dress_1.png"),
    // Hijab
    product("Chiffon Premium Hijab", "Soft cream chiffon hijab", 50, dec!(35.00), 3, "images/products/hijab_1.png"),
    product("Jersey Cotton Hijab", "Comfortable dusty rose jersey hijab", 40, dec!(28.00), 3, "images/products/hijab_1.png"),
    product("Silk Blend Hijab", "Luxurious silk blend hijab in beige", 30, dec!(55.00), 3, "images/products/hijab_1.png"),
    // Jacket
    product("Wool Blazer", "Classic beige wool blazer", 8, dec!(189.00), 4, "images/products/jacket_1.png"),
    product("Leather Jacket", "Trendy black leather jacket", 6, dec!(250.00), 4, "images/products/jacket_1.png"),
    product("Trench Coat", "Elegant camel trench coat", 10, dec!(220.00), 4, "images/products/jacket_1.png"),
    // Accessory
    product("Gold Hoop Earrings", "Elegant gold hoop earrings", 25, dec!(45.00), 5, "images/products/accessory_1.png"),
    product("Designer Handbag", "Premium beige leather handbag", 5, dec!(350.00), 5, "images/products/accessory_1.png"),
    product("Pearl Necklace", "Classic freshwater pearl necklace", 15, dec!(125.00), 5, "images/products/accessory_1.png"),
];

impl CategorySeed {
    pub fn to_active_model(&self) -> category::ActiveModel {
        category::ActiveModel {
            category_id: Set(self.category_id),
            name: Set(self.name.to_string()),
            description: Set(Some(self.description.to_string())),
            image_path: Set(Some(self.image_path.to_string())),
        }
    }
}

impl ProductSeed {
    /// `item_id` is left to AUTO_INCREMENT
    pub fn to_active_model(&self) -> stock_item::ActiveModel {
        stock_item::ActiveModel {
            item_id: NotSet,
            name: Set(self.name.to_string()),
            description: Set(Some(self.description.to_string())),
            stock_quantity: Set(self.stock_quantity),
            unit_price: Set(self.unit_price),
            category_id: Set(Some(self.category_id)),
            image_path: Set(Some(self.image_path.to_string())),
        }
    }
}
