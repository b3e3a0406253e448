//! Subscription purchase flow: session state machine, gateway seam, Fondy
//! client and the service tying them to account subscriptions.

mod fondy;
mod gateway;
mod service;
mod session;

pub use fondy::{sign, FondyGateway};
pub use gateway::{CallbackEvent, Checkout, CheckoutRequest, GatewayError, PaymentGateway};
pub use service::{CallbackReceipt, DemoActivation, PaymentInitiation, SubscriptionService};
pub use session::{PaymentOutcome, PaymentSession, PaymentStatus, Transition};
