//! Domain documents, request payloads and response schemas.
//!
//! Every type crossing the HTTP boundary derives `ToSchema` (OpenAPI) and `TS`
//! (TypeScript bindings for the dashboard client). Documents stored in Postgres
//! also derive `FromRow`.

pub mod category;
pub mod common;
pub mod currency;
pub mod image;
pub mod order;
pub mod product;
pub mod settings;
pub mod stats;
pub mod user;

pub use category::{Category, CreateCategoryRequest, UpdateCategoryRequest};
pub use common::{ApiResponse, Page, PageParams, PageQuery, SortOrder};
pub use currency::{CreateCurrencyRequest, Currency, UpdateCurrencyRequest};
pub use image::{Image, RegisterImageRequest, UploadUrlRequest, UploadUrlResponse};
pub use order::{
    CreateOrderItem, CreateOrderRequest, FormattedOrder, FormattedOrderItem, Order,
    OrderCustomer, OrderFilter, OrderItem, OrderSort, OrderStatus, UpdateOrderStatusRequest,
};
pub use product::{
    CreateProductRequest, Product, ProductColor, ProductDetails, ProductFilter, ProductSort,
    ProductStatus, UpdateProductRequest,
};
pub use settings::{StoreSettings, UpdateSettingsRequest};
pub use stats::{DashboardStats, MonthlyRevenue, StatsSnapshot, StatusCount, TopProduct};
pub use user::{
    ChangePasswordRequest, CreateUserRequest, LoginRequest, LoginResponse, UpdateUserRequest,
    User, UserFilter, UserProfile, UserRole, UserSort,
};

/// Object-key prefix for every gallery upload.
pub const GALLERY_PREFIX: &str = "gallery/";
