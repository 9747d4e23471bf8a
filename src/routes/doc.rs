use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    clients::search::{DocumentImage, ItemDocument},
    dto::{
        admin::{
            DeleteResourceRequest, ReindexSummary, ReportList, ResourceKind, ReviewList,
            SetRoleRequest, UserList,
        },
        categories::{CategoryList, CategoryNode},
        items::{
            CommentRequest, CreateItemRequest, ItemDetail, ItemList, SearchHits,
            UpdateItemRequest, UploadedImage,
        },
        orders::{ChatList, ChatRequest, OrderDetail, OrderList, ReviewRequest, TrackingRequest},
        purchase::{PurchaseOutcome, PurchaseRequest, TopupRequest},
        users::{
            AddressList, AddressRequest, Balance, FavoriteState, PublicProfile, ReportRequest,
            UpdateProfileRequest,
        },
    },
    models::{Account, Address, Chat, Comment, ImageRef, Item, Order, Report, Review, User},
    response::{ApiResponse, Deleted, Meta, Redirect},
    routes::{admin, categories, health, items, orders, params, purchase, users},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        items::list_items,
        items::search_items,
        items::create_item,
        items::get_item,
        items::update_item,
        items::delete_item,
        items::post_comment,
        items::toggle_favorite,
        items::upload_image,
        purchase::checkout,
        purchase::purchase_with_points,
        purchase::callback,
        orders::list_purchases,
        orders::list_sales,
        orders::get_order,
        orders::confirm_payment,
        orders::set_tracking,
        orders::review,
        orders::list_chats,
        orders::post_chat,
        users::me,
        users::update_profile,
        users::public_profile,
        users::list_addresses,
        users::add_address,
        users::delete_address,
        users::list_favorites,
        users::report,
        users::connect_payout,
        users::start_topup,
        users::topup_callback,
        categories::list_categories,
        categories::get_category,
        admin::list_users,
        admin::suspend_user,
        admin::recover_user,
        admin::set_role,
        admin::list_all_orders,
        admin::list_reports,
        admin::list_reviews,
        admin::delete_resource,
        admin::reindex
    ),
    components(
        schemas(
            User,
            Account,
            ImageRef,
            Item,
            Order,
            Address,
            Comment,
            Chat,
            Review,
            Report,
            ItemDocument,
            DocumentImage,
            CreateItemRequest,
            UpdateItemRequest,
            CommentRequest,
            ItemList,
            ItemDetail,
            SearchHits,
            UploadedImage,
            PurchaseRequest,
            PurchaseOutcome,
            TopupRequest,
            ReviewRequest,
            TrackingRequest,
            ChatRequest,
            OrderDetail,
            OrderList,
            ChatList,
            UpdateProfileRequest,
            AddressRequest,
            AddressList,
            PublicProfile,
            FavoriteState,
            ReportRequest,
            Balance,
            ResourceKind,
            DeleteResourceRequest,
            SetRoleRequest,
            UserList,
            ReportList,
            ReviewList,
            ReindexSummary,
            CategoryNode,
            CategoryList,
            params::Pagination,
            params::ItemQuery,
            params::SearchQuery,
            params::OrderListQuery,
            Meta,
            Redirect,
            Deleted,
            ApiResponse<Item>,
            ApiResponse<ItemDetail>,
            ApiResponse<ItemList>,
            ApiResponse<PurchaseOutcome>,
            ApiResponse<OrderDetail>,
            ApiResponse<OrderList>,
            ApiResponse<Account>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Items", description = "Listing, search and favorite endpoints"),
        (name = "Purchase", description = "Checkout and settlement endpoints"),
        (name = "Orders", description = "Transaction ledger endpoints"),
        (name = "Users", description = "Profile, address, point and payout endpoints"),
        (name = "Categories", description = "Category taxonomy"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
