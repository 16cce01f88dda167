//! System prompts per conversation language.

use std::fmt;

/// The seed reply that follows the system prompt in every new conversation.
pub const ACKNOWLEDGEMENT: &str = "Yes, I am Kisan Sathi. I am ready to help.";

const PROMPT_EN: &str = "You are Kisan Sathi, an expert agricultural assistant helping Indian farmers.
Provide practical, accurate advice on:
- Crop cultivation and farming techniques
- Pest and disease management
- Soil health and fertilizers
- Weather-related farming decisions
- Government schemes for farmers
- Market prices and crop selling

Keep responses concise, practical, and easy to understand.
**Use Markdown for formatting, including headings, bold text, and bulleted/numbered lists to structure your answers.**
Always be respectful and supportive.";

const PROMPT_HI: &str = "आप किसान साथी हैं, भारतीय किसानों की मदद करने वाले एक विशेषज्ञ कृषि सहायक हैं।
निम्नलिखित विषयों पर व्यावहारिक, सटीक सलाह दें:
- फसल की खेती और कृषि तकनीक
- कीट और रोग प्रबंधन
- मिट्टी का स्वास्थ्य और उर्वरक
- मौसम से संबंधित खेती के निर्णय
- किसानों के लिए सरकारी योजनाएं
- बाजार मूल्य और फसल बिक्री

जवाब संक्षिप्त, व्यावहारिक और समझने में आसान रखें।
**अपने उत्तरों को संरचित करने के लिए हेडिंग, बोल्ड टेक्स्ट और बुलेटेड/क्रमांकित सूचियों सहित फ़ॉर्मेटिंग के लिए मार्कडाउन का उपयोग करें।**
हमेशा सम्मानजनक और सहायक रहें।";

const PROMPT_MR: &str = "तुम्ही किसान साथी आहात, भारतीय शेतकऱ्यांना मदत करणारे तज्ञ कृषी सहाय्यक आहात.
खालील विषयांवर व्यावहारिक, अचूक सल्ला द्या:
- पीक लागवड आणि शेती तंत्र
- कीटक आणि रोग व्यवस्थापन
- मातीचे आरोग्य आणि खते
- हवामानाशी संबंधित शेती निर्णय
- शेतकऱ्यांसाठी सरकारी योजना
- बाजार किंमत आणि पीक विक्री

उत्तरे संक्षिप्त, व्यावहारिक आणि समजण्यास सोपी ठेवा.
**तुमची उत्तरे संरचित करण्यासाठी मथळे, ठळक मजकूर आणि बुलेटेड/क्रमांकित सूचीसह स्वरूपनासाठी मार्कडाउन वापरा.**
नेहमी आदरपूर्ण आणि सहाय्यक रहा.";

/// A supported conversation language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Language {
    #[default]
    English,
    Hindi,
    Marathi,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::English, Language::Hindi, Language::Marathi];

    /// Maps a language code (`en`, `hi`, `mr`, any case, surrounding whitespace
    /// ignored) to a language. Anything else is English.
    pub fn from_code(code: &str) -> Self {
        let code = code.trim();
        if code.eq_ignore_ascii_case("hi") {
            Language::Hindi
        } else if code.eq_ignore_ascii_case("mr") {
            Language::Marathi
        } else {
            Language::English
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Hindi => "hi",
            Language::Marathi => "mr",
        }
    }

    pub fn system_prompt(self) -> &'static str {
        match self {
            Language::English => PROMPT_EN,
            Language::Hindi => PROMPT_HI,
            Language::Marathi => PROMPT_MR,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// System prompt for a raw language code, falling back to English.
pub fn prompt_for(code: &str) -> &'static str {
    Language::from_code(code).system_prompt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes() {
        assert_eq!(Language::from_code("en"), Language::English);
        assert_eq!(Language::from_code("hi"), Language::Hindi);
        assert_eq!(Language::from_code("mr"), Language::Marathi);
        assert_eq!(Language::from_code(" HI "), Language::Hindi);
    }

    #[test]
    fn unknown_codes_fall_back_to_english() {
        for code in ["fr", "", "english", "hin"] {
            assert_eq!(Language::from_code(code), Language::English, "{code:?}");
            assert_eq!(prompt_for(code), PROMPT_EN);
        }
    }

    #[test]
    fn codes_round_trip() {
        for language in Language::ALL {
            assert_eq!(Language::from_code(language.code()), language);
            assert_eq!(language.to_string(), language.code());
        }
    }

    #[test]
    fn prompts_are_distinct_and_in_language() {
        assert!(prompt_for("en").starts_with("You are Kisan Sathi"));
        assert!(prompt_for("hi").contains("किसान साथी"));
        assert!(prompt_for("mr").contains("शेतकऱ्यांना"));
        assert_ne!(prompt_for("hi"), prompt_for("mr"));
    }

    #[test]
    fn default_is_english() {
        assert_eq!(Language::default(), Language::English);
    }
}
