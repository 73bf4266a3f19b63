//! User-facing texts (Bengali, HTML parse mode).
//!
//! Every dynamic value is escaped here so callers can pass raw names, links
//! and error strings.

use crate::{
    errors::{Error, UploadError},
    formatting::{escape_html, mention_html, truncate_text},
    media::size_mb,
    ports::UploadOutcome,
};

const UNEXPECTED_ERROR_MAX: usize = 200;

pub fn greeting_simple(first_name: &str) -> String {
    format!(
        "হাই {}! 👋\n\n\
         আমি ফাইল আপলোড বট। আমাকে যেকোনো ফাইল (ডকুমেন্ট, ছবি, ভিডিও, অডিও) পাঠান,\n\
         আমি সেটি আপলোড করে আপনাকে ডাউনলোড লিঙ্ক দেবো।",
        escape_html(first_name)
    )
}

pub fn greeting_hybrid(user_id: i64, first_name: &str) -> String {
    format!(
        "👋 Hello {}!\n\n\
         আমি একটি হাইব্রিড ফাইল আপলোডার। আমাকে যেকোনো সাইজের ফাইল পাঠান, আমি চেষ্টা করবো \
         আপলোড করে আপনাকে লিঙ্ক দিতে। বড় ফাইল প্রসেস করতে একটু বেশি সময় লাগতে পারে। \
         অনুগ্রহ করে ধৈর্য ধরুন।",
        mention_html(user_id, first_name)
    )
}

pub fn help(host: &str, max_mb: u64) -> String {
    format!(
        "📎 ডকুমেন্ট, ছবি, ভিডিও বা অডিও পাঠান। ফাইলটি <b>{}</b>-এ আপলোড করে লিঙ্ক দেওয়া হবে।\n\
         সর্বোচ্চ সাইজ: {max_mb} MB",
        escape_html(host)
    )
}

pub fn unsupported_message() -> String {
    "দুঃখিত, আমি শুধু সাধারণ ডকুমেন্ট, ছবি, ভিডিও বা অডিও ফাইল আপলোড করতে পারি।".to_string()
}

pub fn unauthorized() -> String {
    "⛔ দুঃখিত, আপনি এই বট ব্যবহার করার অনুমতি পাননি।".to_string()
}

pub fn rate_limited(retry_secs: f64) -> String {
    format!("⏳ অনুগ্রহ করে {retry_secs:.1} সেকেন্ড পরে আবার চেষ্টা করুন।")
}

pub fn too_large(name: &str, size: u64, limit: u64) -> String {
    format!(
        "❌ '{}' ফাইলটি অনেক বড় ({:.2} MB)। সর্বোচ্চ {:.0} MB পর্যন্ত সমর্থিত।",
        escape_html(name),
        size_mb(size),
        size_mb(limit)
    )
}

pub fn received_simple(name: &str, host: &str) -> String {
    format!(
        "'{}' ফাইলটি পেয়েছি। {}-এ আপলোড করা হচ্ছে, অনুগ্রহ করে অপেক্ষা করুন...",
        escape_html(name),
        escape_html(host)
    )
}

pub fn received_hybrid() -> String {
    "🔄 ফাইল পেয়েছি, এটি প্রসেসিং এর জন্য প্রস্তুত করা হচ্ছে...".to_string()
}

pub fn owner_missing() -> String {
    "❌ দুঃখিত, বট সঠিকভাবে কনফিগার করা হয়নি (OWNER_ID মিসিং)। ফাইল প্রসেস করা সম্ভব হচ্ছে না।"
        .to_string()
}

pub fn relayed() -> String {
    "✅ ফাইলটি ব্যাকএন্ডে প্রসেসিং এর জন্য পাঠানো হয়েছে। সম্পন্ন হলে এখানে লিঙ্ক দেওয়া হবে।"
        .to_string()
}

pub fn relay_failed(err: &str) -> String {
    format!(
        "❌ ফাইলটি প্রসেসিং এর জন্য পাঠাতে একটি সমস্যা হয়েছে: {}",
        escape_html(err)
    )
}

pub fn processing_own_file() -> String {
    "🔄 আপনার নিজের পাঠানো ফাইল প্রসেস করা হচ্ছে...".to_string()
}

pub fn downloading(name: &str) -> String {
    format!(
        "⏳ আপনার ফাইল ('{}') টেলিগ্রাম থেকে ডাউনলোড করা হচ্ছে...",
        escape_html(name)
    )
}

pub fn download_failed(name: &str) -> String {
    format!(
        "❌ টেলিগ্রাম থেকে '{}' ডাউনলোড করতে ব্যর্থ হয়েছে।",
        escape_html(name)
    )
}

pub fn uploading(name: &str, bytes: u64, host: &str) -> String {
    format!(
        "⏳ '{}' ({:.2} MB) {} তে আপলোড করা হচ্ছে...",
        escape_html(name),
        size_mb(bytes),
        escape_html(host)
    )
}

pub fn upload_succeeded(outcome: &UploadOutcome, retention_hint: Option<&str>) -> String {
    let mut out = format!(
        "✅ ফাইল সফলভাবে আপলোড হয়েছে!\n\n\
         🏷️ <b>নাম:</b> {}\n\
         🔗 <b>ডাউনলোড লিঙ্ক:</b> {}",
        escape_html(&outcome.file_name),
        escape_html(&outcome.download_url)
    );
    if let Some(code) = &outcome.admin_code {
        out.push_str(&format!(
            "\n🔑 <b>অ্যাডমিন কোড:</b> <code>{}</code> (ফাইল পরিচালনার জন্য)",
            escape_html(code)
        ));
    }
    if let Some(hint) = retention_hint {
        out.push_str(&format!("\n\n({})", escape_html(hint)));
    }
    out
}

/// Status text for a failed job, chosen by error kind.
pub fn upload_failed(err: &Error) -> String {
    match err {
        Error::Upload(UploadError::Timeout { host }) => {
            format!("❌ {} আপলোড টাইম আউট হয়েছে।", escape_html(host))
        }
        Error::Upload(UploadError::Request { host, reason }) => format!(
            "❌ {} আপলোড ত্রুটি: {}",
            escape_html(host),
            escape_html(&truncate_text(reason, UNEXPECTED_ERROR_MAX))
        ),
        Error::Upload(UploadError::Decode { host, .. }) => {
            format!("❌ {} থেকে উত্তর প্রক্রিয়াকরণে ত্রুটি।", escape_html(host))
        }
        Error::Upload(UploadError::Rejected { host, status }) => format!(
            "❌ {} তে আপলোড ব্যর্থ হয়েছে: {}",
            escape_html(host),
            escape_html(status)
        ),
        Error::Upload(UploadError::MissingLink { host }) => format!(
            "✅ {} আপলোড সফল হয়েছে, কিন্তু ডাউনলোড লিঙ্ক পাওয়া যায়নি।",
            escape_html(host)
        ),
        other => format!(
            "❌ একটি অপ্রত্যাশিত ত্রুটি ঘটেছে ফাইল প্রসেসিং এর সময়: {}",
            escape_html(&truncate_text(&other.to_string(), UNEXPECTED_ERROR_MAX))
        ),
    }
}

pub fn owner_started(bot_username: &str) -> String {
    format!(
        "🟢 হাইব্রিড আপলোড বট (@{}) চালু হয়েছে!",
        escape_html(bot_username)
    )
}

pub fn log_started() -> String {
    "🚀 বট সফলভাবে চালু হয়েছে এবং কানেক্টেড।".to_string()
}

pub fn log_stopping() -> String {
    "🛑 বট বন্ধ হয়ে যাচ্ছে।".to_string()
}

pub fn handler_error(err: &str) -> String {
    format!(
        "⚠️ <b>Bot error</b>\n<code>{}</code>",
        escape_html(&truncate_text(err, 300))
    )
}

pub fn retry_usage() -> String {
    "ℹ️ /retry কমান্ডটি একটি টিকিট মেসেজের রিপ্লাই হিসেবে পাঠান।".to_string()
}

pub fn retry_unknown() -> String {
    "❌ এই টিকিটের কোনো জব পাওয়া যায়নি (বট রিস্টার্ট হয়ে থাকতে পারে)।".to_string()
}

pub fn retry_started() -> String {
    "🔁 জবটি আবার চালু করা হয়েছে।".to_string()
}
