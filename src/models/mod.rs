pub mod premium;
pub mod referral;
