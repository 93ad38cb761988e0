pub const RECIPE_COUNT_PER_PAGE: i64 = 6;
pub const SUBSCRIPTION_COUNT_PER_PAGE: i64 = 6;
pub const SUBSCRIPTION_RECIPES_LIMIT: i64 = 3;
pub const INGREDIENT_SEARCH_LIMIT: i64 = 50;

pub const MAX_NAME_LENGTH: usize = 200;

pub const SESSION_COOKIE: &str = "session";
pub const SESSION_HEADER_PREFIX: &str = "Token ";

pub const SHOPPING_LIST_TEXT_FILENAME: &str = "shopping_list.txt";
pub const SHOPPING_LIST_PDF_FILENAME: &str = "list.pdf";
pub const SHOPPING_LIST_TITLE: &str = "Shopping list:";
pub const SHOPPING_LIST_DOCUMENT_ID: &str = "foodgram-shopping-list";

/* PDF layout, in points on an A4 page */
pub const PDF_PAGE_WIDTH: f32 = 595.0;
pub const PDF_PAGE_HEIGHT: f32 = 842.0;
pub const PDF_MARGIN_LEFT: f32 = 50.0;
pub const PDF_MARGIN_BOTTOM: f32 = 50.0;
pub const PDF_TITLE_BASELINE: f32 = 830.0;
pub const PDF_TITLE_FONT_SIZE: f32 = 24.0;
pub const PDF_FIRST_LINE_BASELINE: f32 = 790.0;
pub const PDF_LINE_FONT_SIZE: f32 = 14.0;
pub const PDF_LINE_SPACING: f32 = 25.0;
