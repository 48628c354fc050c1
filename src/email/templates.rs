pub const OTP_SUBJECT: &str = "Your Staffdesk verification code";

pub fn render_otp(code: &str, valid_minutes: i64) -> String {
    format!(
        "Your Staffdesk verification code is {code}.\n\n\
         It expires in {valid_minutes} minutes. If you did not sign up, you can ignore this email.\n"
    )
}
