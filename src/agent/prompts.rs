//! System instructions and stock replies per language

use crate::types::LanguageTag;

const PROMPT_EN: &str = "You are a helpful multilingual AI assistant. \
Provide clear, concise, and accurate responses in English.";

const PROMPT_HI: &str = "You are a helpful multilingual AI assistant. \
Provide clear, concise, and accurate responses in Hindi (use both Hindi and Roman script when appropriate). \
Make sure your Hindi is grammatically correct and natural sounding.";

const PROMPT_GENERIC: &str = "You are a helpful multilingual AI assistant. \
Provide clear, concise, and accurate responses.";

/// Appended to Hindi user text so the model answers in mixed script
pub const HINDI_DIRECTIVE: &str =
    "Please respond in Hindi. Use a mix of Hindi script and Roman script where appropriate.";

/// System instruction for a reply in `tag`
pub fn system_prompt(tag: LanguageTag) -> &'static str {
    match tag {
        LanguageTag::En => PROMPT_EN,
        LanguageTag::Hi => PROMPT_HI,
        _ => PROMPT_GENERIC,
    }
}

/// User message content as sent to the model
pub fn user_content(text: &str, tag: LanguageTag) -> String {
    match tag {
        LanguageTag::Hi => format!("{}\n\n{}", text, HINDI_DIRECTIVE),
        _ => text.to_string(),
    }
}

/// Pre-written replies used when a stage has nothing better to offer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockMessage {
    /// No model credential configured
    ServiceUnavailable,
    /// Every endpoint failed on every pass
    Exhausted,
    /// Nothing to send to the model
    EmptyPrompt,
    /// Nothing was heard or typed
    NoInput,
}

impl StockMessage {
    /// Text in `tag`, English for `auto`
    pub fn text(&self, tag: LanguageTag) -> &'static str {
        use LanguageTag::*;
        use StockMessage::*;

        match (self, tag) {
            (ServiceUnavailable, Hi) => {
                "क्षमा करें, इस समय मेरे पास भाषा मॉडल सेवा की पहुँच नहीं है। कृपया अपनी API कुंजी जांचें।"
            }
            (ServiceUnavailable, Es) => {
                "Lo siento, ahora mismo no tengo acceso al servicio del modelo de lenguaje. Por favor, revisa tu clave de API."
            }
            (ServiceUnavailable, Fr) => {
                "Désolé, je n'ai pas accès au service de modèle de langage pour le moment. Veuillez vérifier votre clé API."
            }
            (ServiceUnavailable, De) => {
                "Entschuldigung, ich habe derzeit keinen Zugriff auf den Sprachmodell-Dienst. Bitte überprüfe deinen API-Schlüssel."
            }
            (ServiceUnavailable, _) => {
                "I'm sorry, but I don't have access to the language model service at the moment. Please check your API key."
            }

            (Exhausted, Hi) => {
                "मुझे खेद है, मैं इस समय AI से जवाब नहीं ले पा रहा हूँ। कृपया बाद में पुनः प्रयास करें।"
            }
            (Exhausted, Es) => {
                "Lo siento, no pude obtener una respuesta de la IA en este momento. Por favor, inténtalo de nuevo más tarde."
            }
            (Exhausted, Fr) => {
                "Désolé, je n'ai pas pu obtenir de réponse de l'IA pour le moment. Veuillez réessayer plus tard."
            }
            (Exhausted, De) => {
                "Entschuldigung, ich konnte gerade keine Antwort von der KI erhalten. Bitte versuche es später noch einmal."
            }
            (Exhausted, _) => {
                "I'm sorry, but I couldn't get a response from the AI at this time. Please try again later."
            }

            (EmptyPrompt, Hi) => "क्षमा करें, मैं उस संदेश को संसाधित नहीं कर सका।",
            (EmptyPrompt, Es) => "Lo siento, no pude procesar ese mensaje.",
            (EmptyPrompt, Fr) => "Désolé, je n'ai pas pu traiter ce message.",
            (EmptyPrompt, De) => "Entschuldigung, ich konnte diese Nachricht nicht verarbeiten.",
            (EmptyPrompt, _) => "I'm sorry, I couldn't process that message.",

            (NoInput, Hi) => "मुझे कुछ सुनाई नहीं दिया। कृपया फिर से प्रयास करें।",
            (NoInput, Es) => "No escuché nada. Por favor, inténtalo de nuevo.",
            (NoInput, Fr) => "Je n'ai rien entendu. Veuillez réessayer.",
            (NoInput, De) => "Ich habe nichts gehört. Bitte versuche es noch einmal.",
            (NoInput, _) => "I didn't hear anything. Please try again.",
        }
    }
}
