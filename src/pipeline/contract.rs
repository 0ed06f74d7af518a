//! The extraction contract: what the model must return.
//!
//! [`comparison_schema`] is sent to the model as a structured-output
//! constraint. Enforcement happens on the model side and is probabilistic,
//! so [`parse_comparison`] treats the reply as untrusted input: it either
//! yields a [`ComparisonResult`] or an [`PolicyCompareError::Extraction`],
//! with no attempt to repair malformed output.

use crate::config::ResponseLanguage;
use crate::error::PolicyCompareError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Structured data for one submitted document.
///
/// Missing information is carried as the language's sentinel string or `0`,
/// never by omission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedPolicyRecord {
    pub company_name: String,
    #[serde(default)]
    pub policy_type: String,
    /// Total premium, numeric only (currency symbols stripped).
    pub premium_amount: f64,
    pub currency: String,
    /// Free text: documents express coverage inconsistently.
    pub coverage_amount: String,
    /// Free text: an amount or a percentage.
    pub deductible: String,
    pub limits: Vec<String>,
    #[serde(default)]
    pub pros: Vec<String>,
    #[serde(default)]
    pub cons: Vec<String>,
}

/// The whole model answer: one record per document plus a narrative summary.
///
/// Created once per comparison and replaced wholesale, never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub policies: Vec<ExtractedPolicyRecord>,
    pub summary: String,
}

/// Field names the schema marks as required on every policy object.
pub const REQUIRED_POLICY_FIELDS: [&str; 6] = [
    "companyName",
    "premiumAmount",
    "currency",
    "coverageAmount",
    "deductible",
    "limits",
];

/// Build the structured-output schema (Gemini schema dialect).
pub fn comparison_schema(language: ResponseLanguage) -> Value {
    let d = descriptions(language);
    let string_list = |description: &str| {
        json!({
            "type": "ARRAY",
            "items": { "type": "STRING" },
            "description": description,
        })
    };

    let policy = json!({
        "type": "OBJECT",
        "properties": {
            "companyName":    { "type": "STRING", "description": d.company_name },
            "policyType":     { "type": "STRING", "description": d.policy_type },
            "premiumAmount":  { "type": "NUMBER", "description": d.premium_amount },
            "currency":       { "type": "STRING", "description": d.currency },
            "coverageAmount": { "type": "STRING", "description": d.coverage_amount },
            "deductible":     { "type": "STRING", "description": d.deductible },
            "limits": string_list(d.limits),
            "pros":   string_list(d.pros),
            "cons":   string_list(d.cons),
        },
        "required": REQUIRED_POLICY_FIELDS,
    });

    json!({
        "type": "OBJECT",
        "properties": {
            "policies": {
                "type": "ARRAY",
                "items": policy,
                "description": d.policies,
            },
            "summary": { "type": "STRING", "description": d.summary },
        },
        "required": ["policies", "summary"],
    })
}

/// Parse the model's reply into a [`ComparisonResult`].
///
/// No numeric, currency or count checks are applied; a reply with fewer
/// policies than submitted documents is accepted as-is.
pub fn parse_comparison(text: &str) -> Result<ComparisonResult, PolicyCompareError> {
    if text.trim().is_empty() {
        return Err(PolicyCompareError::Extraction(
            "the model returned no data".into(),
        ));
    }
    serde_json::from_str(text).map_err(|e| {
        PolicyCompareError::Extraction(format!("response does not match the contract: {e}"))
    })
}

struct Descriptions {
    company_name: &'static str,
    policy_type: &'static str,
    premium_amount: &'static str,
    currency: &'static str,
    coverage_amount: &'static str,
    deductible: &'static str,
    limits: &'static str,
    pros: &'static str,
    cons: &'static str,
    policies: &'static str,
    summary: &'static str,
}

fn descriptions(language: ResponseLanguage) -> Descriptions {
    match language {
        ResponseLanguage::Turkish => Descriptions {
            company_name: "Sigorta şirketinin adı.",
            policy_type: "Poliçe türü (Kasko, Trafik, Sağlık, Konut vb.).",
            premium_amount: "Toplam prim tutarı (sadece sayı).",
            currency: "Para birimi (TL, USD, EUR).",
            coverage_amount: "Toplam sigorta bedeli veya teminat limiti.",
            deductible: "Muafiyet tutarı veya oranı.",
            limits: "Önemli teminat limitlerinin listesi (İhtiyari Mali Mesuliyet vb.).",
            pros: "Bu teklifin diğerlerine göre veya genel olarak avantajlı yönleri.",
            cons: "Bu teklifin dezavantajları veya dikkat edilmesi gereken eksiklikleri.",
            policies: "Analiz edilen her bir dosya için çıkarılan yapılandırılmış veriler.",
            summary: "Tüm tekliflerin karşılaştırmalı kısa bir özeti ve öneri.",
        },
        ResponseLanguage::English => Descriptions {
            company_name: "Name of the insurance company.",
            policy_type: "Policy type (motor, third-party liability, health, home, etc.).",
            premium_amount: "Total premium amount (number only).",
            currency: "Currency code (TL, USD, EUR).",
            coverage_amount: "Total sum insured or coverage limit.",
            deductible: "Deductible amount or percentage retained by the insured.",
            limits: "List of the important coverage limits (third-party liability, etc.).",
            pros: "Advantages of this offer, in general or compared to the others.",
            cons: "Disadvantages of this offer or gaps to watch out for.",
            policies: "Structured data extracted for each analysed file.",
            summary: "A short comparative summary of all offers with a recommendation.",
        },
    }
}
