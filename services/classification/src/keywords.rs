//! Narration keyword and location tables for the cost optimizer and rule
//! fallback. The strong-business/strong-personal lists are the Glossary's
//! authoritative lists, used verbatim by both modules; the moderate/weak
//! tiers and location tables are rule-fallback-only detail.

/// Glossary "Strong-business keyword" list, used both by the cost optimizer's
/// complexity score and as the top tier of the rule fallback's narration scan.
pub const STRONG_BUSINESS_KEYWORDS: &[&str] = &[
    "invoice",
    "payment for goods",
    "payment for services",
    "contract payment",
    "professional fee",
    "consultation",
    "commission",
    "sales revenue",
    "business income",
    "service charge",
    "delivery fee",
    "installation",
];

/// Glossary "Strong-personal keyword" list.
pub const STRONG_PERSONAL_KEYWORDS: &[&str] = &[
    "salary",
    "wage",
    "allowance",
    "stipend",
    "pension",
    "family support",
    "personal loan",
    "gift",
    "donation",
    "pocket money",
    "upkeep",
    "maintenance",
    "welfare",
];

pub const MODERATE_BUSINESS_KEYWORDS: &[&str] = &[
    "payment", "purchase", "order", "supply", "delivery", "work", "job", "project", "service", "goods", "product",
    "sales", "revenue", "income",
];

pub const WEAK_BUSINESS_KEYWORDS: &[&str] = &["transfer", "money", "cash", "fund", "deposit", "credit", "amount", "sum", "value"];

pub const MODERATE_PERSONAL_KEYWORDS: &[&str] = &[
    "family", "personal", "loan", "borrow", "lend", "refund", "reversal", "correction", "return", "airtime", "data",
    "recharge", "top up",
];

pub const MAJOR_MARKETS: &[&str] = &[
    "alaba market",
    "computer village",
    "trade fair complex",
    "main market",
    "central market",
    "new market",
    "aba market",
    "onitsha market",
    "kurmi market",
    "wuse market",
    "garki market",
    "maitama market",
];

pub const BUSINESS_DISTRICTS: &[&str] = &[
    "victoria island",
    "lagos island",
    "ikoyi",
    "lekki",
    "ikeja",
    "surulere",
    "yaba",
    "apapa",
    "wuse",
    "maitama",
    "garki",
    "central area",
    "port harcourt",
    "aba",
    "onitsha",
    "enugu",
    "kano",
    "kaduna",
    "ibadan",
    "jos",
];

pub const INDUSTRIAL_AREAS: &[&str] =
    &["industrial estate", "industrial layout", "manufacturing zone", "factory", "plant", "agbara", "nnewi", "aba industrial"];
