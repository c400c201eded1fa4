pub mod activity_repository;
pub mod announcement_repository;
pub mod bill_repository;
pub mod chat_repository;
pub mod coupon_repository;
pub mod house_repository;
pub mod market_repository;
pub mod order_repository;
pub mod parking_repository;
pub mod repair_repository;
pub mod shop_repository;
pub mod user_repository;
pub mod visitor_repository;

pub use activity_repository::ActivityRepository;
pub use announcement_repository::AnnouncementRepository;
pub use bill_repository::BillRepository;
pub use chat_repository::{ChatRepository, ConversationSummary};
pub use coupon_repository::{CouponRepository, CouponVerifyOutcome};
pub use house_repository::HouseRepository;
pub use market_repository::MarketRepository;
pub use order_repository::{OrderRepository, PlaceOrderOutcome};
pub use parking_repository::ParkingRepository;
pub use repair_repository::RepairRepository;
pub use shop_repository::ShopRepository;
pub use user_repository::UserRepository;
pub use visitor_repository::VisitorRepository;
