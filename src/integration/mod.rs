pub mod sms;
pub mod wechat;

pub use sms::{HttpSmsGateway, MockSmsGateway, SmsGateway};
pub use wechat::{HttpWechatClient, MockWechatClient, WechatClient};
