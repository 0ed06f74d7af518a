//! Prompts for the comparison request.
//!
//! Every instruction sent to the model lives here so prompt changes touch one
//! file and tests can inspect the exact wording. Callers can override the
//! system instruction via [`crate::config::ComparisonConfig::system_prompt`].

use crate::config::ResponseLanguage;
use crate::pipeline::normalize::{NormalizedPayload, TabularSource};

const INSTRUCTION_TR: &str = r#"Ekli sigorta poliçelerini veya tekliflerini analiz et.
Kullanıcının bu teklifleri kolayca karşılaştırmasını sağlamak için aşağıdaki verileri her bir belge için çıkar:
1. Sigorta Şirketi Adı
2. Poliçe Türü
3. Prim Tutarı (Fiyat)
4. Para Birimi
5. Sigorta Bedeli (Toplam Teminat)
6. Muafiyet (Deductible) bilgisi
7. Önemli Limitler (Özellikle İMM - İhtiyari Mali Mesuliyet, Manevi Tazminat vb.)
8. Avantajlar
9. Dezavantajlar

Eğer bir belgede bilgi bulunamıyorsa, ilgili alan için "Belirtilmemiş" veya 0 değerini kullan.
Para birimi sembollerini temizle ve sadece sayısal değeri 'premiumAmount' alanına yaz.
Sonuçları belgelerin gönderildiği sırayla döndür."#;

const INSTRUCTION_EN: &str = r#"Analyse the attached insurance policies or offers.
To let the user compare these offers easily, extract the following data for each document:
1. Insurance company name
2. Policy type
3. Premium amount (price)
4. Currency
5. Sum insured (total coverage)
6. Deductible
7. Important limits (third-party liability, moral damages, etc.)
8. Advantages
9. Disadvantages

If a piece of information cannot be found in a document, use "unspecified" or 0 for that field.
Strip currency symbols and write only the numeric value into the 'premiumAmount' field.
Return the results in the order the documents were submitted."#;

const TABULAR_NOTE_TR: &str =
    "Not: Excel/CSV dosyaları metin formatına dönüştürülmüştür, lütfen içeriklerini buna göre analiz et.";

const TABULAR_NOTE_EN: &str =
    "Note: Excel/CSV files have been converted to text; analyse their contents accordingly.";

const SYSTEM_TR: &str = "Sen uzman bir sigorta danışmanısın. Kullanıcıların karmaşık sigorta \
tekliflerini anlamalarına yardımcı oluyorsun. Türkçe yanıt ver.";

const SYSTEM_EN: &str = "You are an expert insurance advisor. You help users understand complex \
insurance offers. Answer in English.";

/// The fixed instruction appended after all document parts.
///
/// `has_tabular` adds the note explaining that spreadsheets were pre-converted.
pub fn instruction_prompt(language: ResponseLanguage, has_tabular: bool) -> String {
    let (base, note) = match language {
        ResponseLanguage::Turkish => (INSTRUCTION_TR, TABULAR_NOTE_TR),
        ResponseLanguage::English => (INSTRUCTION_EN, TABULAR_NOTE_EN),
    };
    if has_tabular {
        format!("{base}\n\n{note}")
    } else {
        base.to_string()
    }
}

/// Built-in system instruction: advisor persona and response language.
pub fn system_instruction(language: ResponseLanguage) -> &'static str {
    match language {
        ResponseLanguage::Turkish => SYSTEM_TR,
        ResponseLanguage::English => SYSTEM_EN,
    }
}

/// Render a textual payload as the text part sent to the model.
///
/// Returns `None` for binary payloads.
pub fn textual_part(payload: &NormalizedPayload) -> Option<String> {
    match payload {
        NormalizedPayload::Text {
            file_name,
            source,
            content,
        } => {
            let kind = match source {
                TabularSource::Workbook => "Excel",
                TabularSource::Delimited => "CSV",
            };
            Some(format!(
                "File Name: {file_name}\nFile Type: {kind}\nContent:\n{content}"
            ))
        }
        NormalizedPayload::Binary { .. } => None,
    }
}

/// Extra instruction for backends without native schema enforcement.
pub fn schema_instruction(schema_json: &str) -> String {
    format!(
        "Respond with a single JSON object and nothing else. \
         It must conform to this schema:\n{schema_json}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_mentions_sentinel_and_currency_rule() {
        let tr = instruction_prompt(ResponseLanguage::Turkish, false);
        assert!(tr.contains("\"Belirtilmemiş\""));
        assert!(tr.contains("premiumAmount"));
        assert!(!tr.contains("Excel/CSV"));

        let en = instruction_prompt(ResponseLanguage::English, false);
        assert!(en.contains("\"unspecified\""));
        assert!(en.contains("premiumAmount"));
    }

    #[test]
    fn tabular_note_only_when_requested() {
        assert!(instruction_prompt(ResponseLanguage::Turkish, true).ends_with(TABULAR_NOTE_TR));
        assert!(instruction_prompt(ResponseLanguage::English, true).ends_with(TABULAR_NOTE_EN));
    }

    #[test]
    fn instruction_lists_nine_fields() {
        let tr = instruction_prompt(ResponseLanguage::Turkish, false);
        for n in 1..=9 {
            assert!(tr.contains(&format!("{n}. ")), "missing item {n}");
        }
    }

    #[test]
    fn system_instruction_fixes_persona_and_language() {
        assert!(system_instruction(ResponseLanguage::Turkish).contains("Türkçe"));
        assert!(system_instruction(ResponseLanguage::English).contains("insurance advisor"));
    }

    #[test]
    fn textual_part_has_header() {
        let p = NormalizedPayload::Text {
            file_name: "teklif.xlsx".into(),
            source: TabularSource::Workbook,
            content: "--- Sheet: A ---\nx\n\n".into(),
        };
        let part = textual_part(&p).unwrap();
        assert!(part.starts_with("File Name: teklif.xlsx\nFile Type: Excel\nContent:\n"));
        assert!(part.ends_with("--- Sheet: A ---\nx\n\n"));

        let b = NormalizedPayload::Binary {
            file_name: "a.pdf".into(),
            media_type: "application/pdf".into(),
            data: String::new(),
        };
        assert!(textual_part(&b).is_none());
    }
}
