//! Domain profile: every lexicon, pattern table, and example set that ties
//! the guard to one in-domain entity.
//!
//! The defaults describe the Kaso B2B supply-chain platform and the four
//! unrelated companies that share its name. Deployments for another brand
//! override the `[profile]` section of `config.toml`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Placeholder substituted with the brand alternation inside refusal patterns.
pub const BRAND_PLACEHOLDER: &str = "{brand}";

/// An unrelated organization sharing the brand token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollidingEntity {
    /// Stable key, also used as the arbitration label (e.g. "kaso_plastics").
    pub key: String,

    /// Display name (e.g. "Kaso Plastics").
    pub name: String,

    /// One-line description used in refusals and arbitration prompts.
    pub description: String,

    /// Multilingual keywords; two word-boundary hits identify the entity.
    pub keywords: Vec<String>,

    /// Confidence reported when the entity is detected.
    #[serde(default = "default_entity_confidence")]
    pub confidence: f32,
}

fn default_entity_confidence() -> f32 {
    0.9
}

/// Everything the guard knows about the authorized domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainProfile {
    /// Brand display name used in prompts and refusals.
    #[serde(default = "default_display_name")]
    pub display_name: String,

    /// What the in-domain entity is, phrased for prompts.
    #[serde(default = "default_description")]
    pub description: String,

    /// Topics the assistant covers, phrased for prompts.
    #[serde(default = "default_scope")]
    pub scope: Vec<String>,

    /// The brand token in every registered script or transliteration.
    #[serde(default = "default_brand_variants")]
    pub brand_variants: Vec<String>,

    /// Unrelated entities sharing the brand token.
    #[serde(default = "default_colliding_entities")]
    pub colliding_entities: Vec<CollidingEntity>,

    /// In-domain indicator keywords, keyed by language tag.
    #[serde(default = "default_in_domain_keywords")]
    pub in_domain_keywords: BTreeMap<String, Vec<String>>,

    /// Off-topic indicator keywords, keyed by language tag.
    #[serde(default = "default_off_topic_keywords")]
    pub off_topic_keywords: BTreeMap<String, Vec<String>>,

    /// Regexes matched against the lowercased query.
    #[serde(default = "default_greeting_patterns")]
    pub greeting_patterns: Vec<String>,

    /// Representative in-domain questions for the in-domain centroid.
    #[serde(default = "default_in_domain_examples")]
    pub in_domain_examples: Vec<String>,

    /// Representative questions about colliding entities for the second centroid.
    #[serde(default = "default_colliding_examples")]
    pub colliding_examples: Vec<String>,

    /// Pronouns, deictic references and continuation starters.
    #[serde(default = "default_dependency_patterns")]
    pub dependency_patterns: Vec<String>,

    /// Domain-specific named concepts that make a query self-contained.
    #[serde(default = "default_entity_patterns")]
    pub entity_patterns: Vec<String>,

    /// Refusal markers; `{brand}` expands to the brand variants.
    #[serde(default = "default_refusal_patterns")]
    pub refusal_patterns: Vec<String>,

    /// Off-topic vocabulary in generated answers, keyed by language tag.
    #[serde(default = "default_off_topic_response_patterns")]
    pub off_topic_response_patterns: BTreeMap<String, Vec<String>>,
}

impl Default for DomainProfile {
    fn default() -> Self {
        Self {
            display_name: default_display_name(),
            description: default_description(),
            scope: default_scope(),
            brand_variants: default_brand_variants(),
            colliding_entities: default_colliding_entities(),
            in_domain_keywords: default_in_domain_keywords(),
            off_topic_keywords: default_off_topic_keywords(),
            greeting_patterns: default_greeting_patterns(),
            in_domain_examples: default_in_domain_examples(),
            colliding_examples: default_colliding_examples(),
            dependency_patterns: default_dependency_patterns(),
            entity_patterns: default_entity_patterns(),
            refusal_patterns: default_refusal_patterns(),
            off_topic_response_patterns: default_off_topic_response_patterns(),
        }
    }
}

impl DomainProfile {
    /// Look up a colliding entity by key.
    pub fn entity(&self, key: &str) -> Option<&CollidingEntity> {
        self.colliding_entities.iter().find(|e| e.key == key)
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn table(entries: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
    entries
        .iter()
        .map(|(lang, words)| (lang.to_string(), strings(words)))
        .collect()
}

fn default_display_name() -> String {
    "Kaso".into()
}

fn default_description() -> String {
    "Kaso, the B2B supply-chain platform connecting restaurants with suppliers in the UAE and Saudi Arabia".into()
}

fn default_scope() -> Vec<String> {
    strings(&[
        "suppliers, vendors and product catalogs",
        "orders, procurement, pricing and bulk purchasing",
        "delivery, logistics and inventory",
        "accounts, onboarding and platform features",
    ])
}

fn default_brand_variants() -> Vec<String> {
    strings(&["kaso", "كاسو", "كازو", "касо", "カソ", "卡索"])
}

fn default_colliding_entities() -> Vec<CollidingEntity> {
    vec![
        CollidingEntity {
            key: "kaso_plastics".into(),
            name: "Kaso Plastics".into(),
            description: "the American plastics manufacturing company".into(),
            keywords: strings(&[
                "plastic", "plastics", "injection", "molding", "mold", "mould",
                "manufacturing", "manufacture", "factory", "vancouver", "burlington",
                "canada", "contract manufacturing", "custom molding",
                "بلاستيك", "حقن", "قولبة", "تصنيع", "مصنع", "كندا",
            ]),
            confidence: 0.9,
        },
        CollidingEntity {
            key: "kaso_security".into(),
            name: "Kaso Security".into(),
            description: "the Finnish security and safes company".into(),
            keywords: strings(&[
                "safe", "safes", "vault", "vaults", "security", "fireproof",
                "lock", "locks", "helsinki", "finland", "finnish",
                "burglar", "protection", "secure storage",
                "خزنة", "خزائن", "أمن", "أمان", "حماية", "قفل", "فنلندا",
                "coffre-fort", "sécurité",
            ]),
            confidence: 0.9,
        },
        CollidingEntity {
            key: "kaso_medical".into(),
            name: "Kaso Medical".into(),
            description: "the Chinese medical devices company".into(),
            keywords: strings(&[
                "medical", "dental", "dentist", "device", "devices", "equipment",
                "hongkong", "hong kong", "china", "chinese", "healthcare",
                "hospital", "clinic", "oem", "surgical",
                "طبي", "طبية", "أسنان", "جهاز", "أجهزة", "معدات", "صيني",
                "مستشفى", "عيادة", "هونغ كونغ",
            ]),
            confidence: 0.9,
        },
        CollidingEntity {
            key: "kaso_group".into(),
            name: "Kaso Group".into(),
            description: "the Iraqi business conglomerate".into(),
            keywords: strings(&[
                "group", "conglomerate", "construction", "building", "oil",
                "oil services", "trading", "baghdad", "iraq", "iraqi",
                "general trading", "contracting",
                "مجموعة", "بناء", "إنشاءات", "عقارات", "نفط", "بغداد",
                "عراق", "عراقي", "تجارة", "مقاولات",
            ]),
            confidence: 0.85,
        },
    ]
}

fn default_in_domain_keywords() -> BTreeMap<String, Vec<String>> {
    table(&[
        ("ar", &[
            "مورد", "موردين", "منتجات", "طلبات", "مشتريات", "مخزون",
            "توريد", "سلسلة التوريد", "جملة", "كميات", "كتالوج",
            "منصة", "مطاعم", "موردي المطاعم", "توصيل", "أسعار",
            "شراء", "بائع", "تجهيز", "لوجستيات", "فهرس",
        ]),
        ("de", &[
            "lieferant", "lieferanten", "produkte", "bestellung",
            "beschaffung", "lieferkette", "bestand", "plattform",
            "b2b", "marktplatz", "großhandel", "katalog",
            "restaurants", "lieferung", "preise",
        ]),
        ("en", &[
            "supplier", "suppliers", "vendor", "vendors", "products",
            "order", "orders", "procurement", "supply chain", "inventory",
            "stock", "platform", "b2b", "marketplace", "wholesale", "bulk",
            "catalog", "catalogue", "sourcing", "purchase", "restaurants",
            "delivery", "logistics", "pricing", "price", "prices",
        ]),
        ("es", &[
            "proveedor", "proveedores", "productos", "pedido",
            "adquisición", "cadena de suministro", "inventario",
            "plataforma", "b2b", "mercado", "mayorista", "catálogo",
            "restaurantes", "entrega", "precios",
        ]),
        ("fr", &[
            "fournisseur", "fournisseurs", "produits", "commande",
            "approvisionnement", "chaîne d'approvisionnement", "inventaire",
            "plateforme", "b2b", "marché", "gros", "catalogue",
            "restaurants", "livraison", "prix",
        ]),
    ])
}

fn default_off_topic_keywords() -> BTreeMap<String, Vec<String>> {
    table(&[
        ("ar", &[
            "سياسة", "انتخابات", "حرب", "رئيس", "حكومة",
            "برمجة", "كود", "بايثون", "جافا", "برنامج",
            "رياضة", "كرة القدم", "مباراة", "فريق",
            "فيلم", "مسلسل", "ممثل", "سينما",
            "طقس", "حالة الطقس", "درجة الحرارة", "أمطار",
            "تاريخ", "جغرافيا", "علوم", "فيزياء",
            "موسيقى", "أغنية", "مغني",
        ]),
        ("en", &[
            "politics", "election", "war", "president", "government",
            "programming", "code", "python", "java", "software",
            "sports", "football", "soccer", "match", "game", "team",
            "movie", "film", "series", "actor", "cinema",
            "weather", "temperature", "forecast", "rain",
            "history", "geography", "science", "physics",
            "music", "song", "singer", "band",
        ]),
    ])
}

fn default_greeting_patterns() -> Vec<String> {
    strings(&[
        r"^(hi|hello|hey|greetings)\b",
        r"^(مرحبا|السلام عليكم|أهلا|هلا|هاي)\b",
        r"^(how are you|كيف حالك|ازيك|ازيكم)\b",
        r"^(good (morning|afternoon|evening)|صباح الخير|مساء الخير)\b",
        r"^(bonjour|salut|hola|hallo|guten tag|ciao|olá)\b",
    ])
}

fn default_in_domain_examples() -> Vec<String> {
    strings(&[
        "How do I place a bulk order with a supplier on Kaso?",
        "Which suppliers on the Kaso platform deliver to Riyadh?",
        "How can my restaurant compare wholesale prices on Kaso?",
        "How do I track the delivery of my Kaso order?",
        "Can I manage my restaurant inventory through Kaso?",
        "How do suppliers join the Kaso marketplace?",
        "كيف أطلب منتجات من الموردين عبر منصة كاسو؟",
        "ما هي أسعار الجملة على كاسو؟",
        "هل يوفر كاسو توصيل الطلبات للمطاعم في دبي؟",
        "كيف أسجل كمورد في منصة كاسو؟",
    ])
}

fn default_colliding_examples() -> Vec<String> {
    strings(&[
        "Does Kaso Plastics offer custom injection molding?",
        "Where is the Kaso plastics factory in Canada?",
        "How much does a Kaso fireproof safe cost?",
        "Where can I buy a Kaso security vault in Finland?",
        "Does Kaso Medical manufacture dental equipment?",
        "Is Kaso Medical an OEM for surgical devices in China?",
        "What construction projects does Kaso Group run in Baghdad?",
        "Does Kaso Group provide oil services in Iraq?",
        "هل تصنع شركة كاسو خزائن مقاومة للحريق؟",
        "ما هي مشاريع مجموعة كاسو في بغداد؟",
    ])
}

fn default_dependency_patterns() -> Vec<String> {
    strings(&[
        r"\b(it|that|this|these|those|there|here)\b",
        r"\b(هذا|ذلك|هناك|هنا|فيه|به|منه|عنه|ها|هم)\b",
        r"^(what about|how about|and|also|too|أيضا|كمان|كذلك|و)\b",
        r"\b(one|ones|الواحد|الأول|الثاني)\b",
    ])
}

fn default_entity_patterns() -> Vec<String> {
    strings(&[
        r"\b(kaso|كاسو|كازو)\b",
        r"\b(supplier|suppliers|vendor|مورد|موردين)\b",
        r"\b(order|orders|طلب|طلبات)\b",
        r"\b(product|products|catalog|catalogue|منتجات|كتالوج)\b",
        r"\b(price|prices|pricing|cost|سعر|أسعار|تكلفة)\b",
        r"\b(delivery|shipping|توصيل|شحن)\b",
        r"\b(platform|account|منصة|حساب)\b",
    ])
}

fn default_refusal_patterns() -> Vec<String> {
    strings(&[
        r"(sorry|عذراً|آسف|أعتذر|désolé|entschuldigung|lo siento|mi dispiace|desculpe|извините|抱歉|申し訳|죄송)",
        r"(cannot|can't|لا يمكنني|لا أستطيع|ne peux pas|kann nicht|no puedo|non posso|não posso|не могу|无法|できません|수 없)",
        r"(only.*{brand}|فقط.*{brand}|مخصص.*{brand}|uniquement.*{brand}|nur.*{brand}|solo.*{brand}|只.*{brand})",
        r"(outside.*scope|خارج.*نطاق|خارج.*مجال|hors.*cadre|außerhalb.*bereich|fuera.*alcance|범위.*밖)",
        r"(specialized.*assistant|مساعد.*متخصص|مساعد.*خاص|assistant.*spécialisé|spezialisiert.*assistent|asistente.*especializado|전용.*어시스턴트)",
    ])
}

fn default_off_topic_response_patterns() -> BTreeMap<String, Vec<String>> {
    table(&[
        ("ar", &[
            r"(الرئيس|الحكومة|الانتخابات|السياسة)",
            r"(البرمجة|الكود|بايثون|جافا|برمجة)",
            r"(الطقس|درجة الحرارة|الأمطار|حالة الجو)",
            r"(المباراة|الفريق|الدوري|كرة القدم)",
            r"(الفيلم|المسلسل|الممثل|السينما)",
        ]),
        ("de", &[
            r"\b(präsident|regierung|wahl|politik)\b",
            r"\b(programmierung|python|java)\b",
            r"\b(wetter|temperatur|vorhersage|regen|klima)\b",
            r"\b(mannschaft|liga|turnier|spieler)\b",
            r"\b(schauspieler|kino)\b",
        ]),
        ("en", &[
            r"\b(president|government|election|politics|political)\b",
            r"\b(programming|python|java|algorithm)\b",
            r"\b(weather|temperature|forecast|rain|climate)\b",
            r"\b(league|tournament|player)\b",
            r"\b(movie|film|actor|cinema|tv show)\b",
        ]),
        ("es", &[
            r"\b(presidente|gobierno|elección|política)\b",
            r"\b(programación|python|java)\b",
            r"\b(clima|temperatura|pronóstico|lluvia)\b",
            r"\b(liga|torneo|jugador)\b",
            r"\b(película|actor|cine)\b",
        ]),
        ("fr", &[
            r"\b(président|gouvernement|élection|politique)\b",
            r"\b(programmation|python|java)\b",
            r"\b(météo|température|prévision|pluie|climat)\b",
            r"\b(ligue|tournoi|joueur)\b",
            r"\b(acteur|cinéma)\b",
        ]),
        ("ru", &[
            r"\b(президент|правительство|выборы|политика)\b",
            r"\b(программирование|python|java)\b",
            r"\b(погода|температура|прогноз|дождь|климат)\b",
            r"\b(матч|лига|турнир|игрок)\b",
            r"\b(фильм|сериал|актёр|кино)\b",
        ]),
        ("zh", &[
            r"(总统|政府|选举|政治)",
            r"(编程|代码)",
            r"(天气|温度|预报|气候)",
            r"(联赛|锦标赛|球员)",
            r"(电影|电视剧|演员|电影院)",
        ]),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_profile_has_four_colliding_entities() {
        let profile = DomainProfile::default();
        assert_eq!(profile.colliding_entities.len(), 4);
        assert!(profile.entity("kaso_security").is_some());
        assert!(profile.entity("kaso_bakery").is_none());
    }

    #[test]
    fn refusal_patterns_reference_the_brand() {
        let profile = DomainProfile::default();
        assert!(
            profile
                .refusal_patterns
                .iter()
                .any(|p| p.contains(BRAND_PLACEHOLDER))
        );
    }

    #[test]
    fn brand_variants_cover_latin_and_arabic() {
        let profile = DomainProfile::default();
        assert!(profile.brand_variants.iter().any(|v| v == "kaso"));
        assert!(profile.brand_variants.iter().any(|v| v == "كاسو"));
    }
}
