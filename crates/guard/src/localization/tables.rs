//! Pre-written message templates.
//!
//! `{brand}` is replaced with the profile's display name; entity refusals
//! also substitute `{entity}` and, in English, `{entity_description}`.

pub const BRAND: &str = "{brand}";
pub const ENTITY: &str = "{entity}";
pub const ENTITY_DESCRIPTION: &str = "{entity_description}";

pub const REFUSALS: &[(&str, &str)] = &[
    ("ar", "عذراً، أنا مساعد خاص بمنصة {brand} فقط. لا يمكنني الإجابة على أسئلة خارج نطاق {brand}."),
    ("de", "Entschuldigung, ich bin ein spezialisierter Assistent nur für die {brand}-Plattform. Ich kann Fragen außerhalb des {brand}-Bereichs nicht beantworten."),
    ("en", "Sorry, I'm a specialized assistant for the {brand} platform only. I cannot answer questions outside {brand}'s scope."),
    ("es", "Lo siento, soy un asistente especializado solo para la plataforma {brand}. No puedo responder preguntas fuera del alcance de {brand}."),
    ("fr", "Désolé, je suis un assistant spécialisé uniquement pour la plateforme {brand}. Je ne peux pas répondre aux questions hors du cadre de {brand}."),
    ("hi", "क्षमा करें, मैं केवल {brand} प्लेटफॉर्म के लिए एक विशेष सहायक हूं। मैं {brand} के दायरे से बाहर के प्रश्नों का उत्तर नहीं दे सकता।"),
    ("it", "Mi dispiace, sono un assistente specializzato solo per la piattaforma {brand}. Non posso rispondere a domande al di fuori dell'ambito di {brand}."),
    ("ja", "申し訳ございません、私は{brand}プラットフォーム専用のアシスタントです。{brand}の範囲外の質問にはお答えできません。"),
    ("ko", "죄송합니다. 저는 {brand} 플랫폼 전용 어시스턴트입니다. {brand} 범위 밖의 질문에는 답변할 수 없습니다."),
    ("nl", "Sorry, ik ben een gespecialiseerde assistent alleen voor het {brand}-platform. Ik kan geen vragen beantwoorden buiten het bereik van {brand}."),
    ("pl", "Przepraszam, jestem specjalistycznym asystentem tylko dla platformy {brand}. Nie mogę odpowiadać na pytania poza zakresem {brand}."),
    ("pt", "Desculpe, sou um assistente especializado apenas para a plataforma {brand}. Não posso responder a perguntas fora do escopo da {brand}."),
    ("ru", "Извините, я специализированный помощник только для платформы {brand}. Я не могу отвечать на вопросы вне области {brand}."),
    ("tr", "Üzgünüm, sadece {brand} platformu için özel bir asistanım. {brand} kapsamı dışındaki sorulara cevap veremem."),
    ("zh", "抱歉，我是{brand}平台的专业助手。我无法回答{brand}范围之外的问题。"),
];

pub const LANGUAGE_INSTRUCTIONS: &[(&str, &str)] = &[
    ("ar", "يجب أن ترد باللغة العربية."),
    ("de", "Sie müssen auf Deutsch antworten."),
    ("en", "You must respond in English."),
    ("es", "Debes responder en español."),
    ("fr", "Vous devez répondre en français."),
    ("hi", "आपको हिंदी में उत्तर देना होगा।"),
    ("it", "Devi rispondere in italiano."),
    ("ja", "日本語で返答してください。"),
    ("ko", "한국어로 응답해야 합니다."),
    ("nl", "Je moet in het Nederlands antwoorden."),
    ("pl", "Musisz odpowiedzieć po polsku."),
    ("pt", "Você deve responder em português."),
    ("ru", "Вы должны отвечать на русском языке."),
    ("tr", "Türkçe cevap vermelisiniz."),
    ("zh", "您必须用中文回答。"),
];

pub const RTL_LANGUAGES: &[&str] = &["ar", "fa", "he", "ur"];

/// Entity refusal: `named` mentions a known entity, `unknown` covers any
/// other same-named company.
pub struct EntityRefusal {
    pub named: &'static str,
    pub unknown: &'static str,
}

pub const ENTITY_REFUSALS: &[(&str, EntityRefusal)] = &[
    ("ar", EntityRefusal {
        named: "عذراً، أنا مساعد خاص بمنصة {brand} فقط. يبدو أنك تسأل عن {entity}. أنا لا أملك معلومات عن تلك الشركة.",
        unknown: "عذراً، أنا مساعد خاص بمنصة {brand} فقط. يبدو أنك تسأل عن شركة أخرى تحمل اسم {brand}. أنا لا أملك معلومات عن الشركات الأخرى.",
    }),
    ("de", EntityRefusal {
        named: "Entschuldigung, ich bin ein spezialisierter Assistent nur für die {brand}-Plattform. Es scheint, Sie fragen nach {entity}. Ich habe keine Informationen über dieses Unternehmen.",
        unknown: "Entschuldigung, ich bin ein spezialisierter Assistent nur für die {brand}-Plattform. Es scheint, Sie fragen nach einem anderen Unternehmen namens {brand}. Ich habe keine Informationen über andere {brand}-Unternehmen.",
    }),
    ("en", EntityRefusal {
        named: "Sorry, I'm a specialized assistant for the {brand} platform only. It seems you're asking about {entity} ({entity_description}). I don't have information about that company.",
        unknown: "Sorry, I'm a specialized assistant for the {brand} platform only. It seems you're asking about a different company named {brand}. I don't have information about other {brand} companies.",
    }),
    ("es", EntityRefusal {
        named: "Lo siento, soy un asistente especializado solo para la plataforma {brand}. Parece que preguntas sobre {entity}. No tengo información sobre esa empresa.",
        unknown: "Lo siento, soy un asistente especializado solo para la plataforma {brand}. Parece que preguntas sobre otra empresa llamada {brand}. No tengo información sobre otras empresas {brand}.",
    }),
    ("fr", EntityRefusal {
        named: "Désolé, je suis un assistant spécialisé uniquement pour la plateforme {brand}. Il semble que vous posiez des questions sur {entity}. Je n'ai pas d'informations sur cette entreprise.",
        unknown: "Désolé, je suis un assistant spécialisé uniquement pour la plateforme {brand}. Il semble que vous posiez des questions sur une autre société nommée {brand}. Je n'ai pas d'informations sur d'autres sociétés {brand}.",
    }),
];

pub fn lookup<'a, T>(table: &'a [(&str, T)], lang: &str) -> Option<&'a T> {
    table.iter().find(|(tag, _)| *tag == lang).map(|(_, value)| value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifteen_languages_in_both_tables() {
        assert_eq!(REFUSALS.len(), 15);
        assert_eq!(LANGUAGE_INSTRUCTIONS.len(), 15);
        for (lang, _) in REFUSALS {
            assert!(lookup(LANGUAGE_INSTRUCTIONS, lang).is_some(), "{lang}");
        }
    }

    #[test]
    fn every_template_names_the_brand() {
        for (lang, text) in REFUSALS {
            assert!(text.contains(BRAND), "{lang}");
        }
        for (lang, t) in ENTITY_REFUSALS {
            assert!(t.named.contains(ENTITY), "{lang}");
            assert!(t.unknown.contains(BRAND), "{lang}");
            assert!(!t.unknown.contains(ENTITY), "{lang}");
        }
    }

    #[test]
    fn lookup_by_tag() {
        assert!(lookup(REFUSALS, "tr").is_some());
        assert!(lookup(REFUSALS, "sw").is_none());
    }
}
