//! # Tokenizador para Português Brasileiro
//!
//! Responsável por dividir o texto bruto em tokens individuais (palavras, pontuações)
//! e por segmentar o texto em sentenças. Cada token preserva sua posição original
//! (offset de bytes) para permitir destacar spans na interface web, e carrega uma
//! forma normalizada (minúsculas, sem acentos) usada pelo casamento com atributo `Norm`.
//!
//! ## Por que sentenças importam aqui?
//!
//! As janelas de contexto do matcher podem ser limitadas à sentença da âncora
//! (`limit_to_sentence`). Por isso o tokenizador também produz os intervalos de
//! sentença, detectando terminadores (`.`, `!`, `?`) sem quebrar em abreviações
//! comuns (ex: "Dr.", "mg") nem em números decimais ("1.234", "70,5").
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use ctxmatch_core::tokenizer::tokenize;
//!
//! let tokens = tokenize("O paciente pesa 70 kg.");
//! assert_eq!(tokens[2].text, "pesa");
//! assert_eq!(tokens[3].norm, "70");
//! ```

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

/// Um token extraído do texto original.
///
/// O `Token` é a unidade atômica de endereçamento do matcher. Ele mantém a referência
/// exata de sua posição no texto original (`start` e `end`), o que é crucial para:
/// 1. Mapear de volta os matches de regex (feitos sobre texto renderizado) para tokens.
/// 2. Destacar (highlight) os spans na interface gráfica sem alterar a formatação original.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Token {
    /// O texto do token como aparece no original (ex: "Paciente", ",", "70").
    pub text: String,
    /// Forma normalizada: minúsculas e sem diacríticos (ex: "paciente").
    pub norm: String,
    /// Índice de byte inicial no texto original (inclusive).
    pub start: usize,
    /// Índice de byte final no texto original (exclusivo).
    pub end: usize,
    /// Índice sequencial do token na lista (0, 1, 2...).
    pub index: usize,
    /// Token composto apenas de espaço em branco (quebras de linha preservadas).
    #[serde(default)]
    pub is_space: bool,
    /// Token marcado como excluído do casamento (ex: trecho de poluição do documento).
    #[serde(default)]
    pub excluded: bool,
}

/// Abreviações comuns em PT-BR que não devem ter o ponto tratado como fim de sentença.
///
/// Unidades de medida ("kg", "mg", "cm"...) ficam de fora: em notas clínicas o
/// ponto depois de uma medida quase sempre encerra a sentença ("pesa 70 kg.").
const ABBREVIATIONS: &[&str] = &[
    "Dr", "Dra", "Sr", "Sra", "Prof", "Profa", "Gov", "Dep", "Sen", "Min",
    "Gen", "Cap", "Sgt", "Cel", "Brig", "Adm", "Des", "Pres", "Eng", "Arq",
    "etc", "vol", "núm", "art", "pág", "pag", "cap", "tel", "fax", "av",
    "pg", "ibid", "op",
];

/// Tokeniza um texto preservando offsets e preenchendo a forma normalizada.
///
/// Esquema: palavras alfanuméricas (com hífen interno), números com separador
/// decimal/milhar ("1.234", "12,5"), abreviações com ponto ("Dr."), e cada
/// pontuação restante como token isolado. Espaços não geram tokens.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current_start = 0;
    let mut current_text = String::new();
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut i = 0;

    while i < chars.len() {
        let (byte_pos, ch) = chars[i];

        if ch.is_alphanumeric() || (ch == '-' && !current_text.is_empty()) {
            if current_text.is_empty() {
                current_start = byte_pos;
            }
            current_text.push(ch);
        } else if (ch == '.' || ch == ',') && !current_text.is_empty() {
            // Ponto/vírgula entre dígitos permanece no token (ex: "1.234", "70,5")
            let current_is_num = current_text.chars().all(char::is_numeric);
            let next_is_num = chars
                .get(i + 1)
                .map(|(_, c)| c.is_numeric())
                .unwrap_or(false);
            // Abreviação conhecida mantém o ponto (ex: "Dr.", "mg.")
            let is_abbrev = ch == '.' && ABBREVIATIONS.contains(&current_text.as_str());

            if current_is_num && next_is_num {
                current_text.push(ch);
            } else if is_abbrev {
                current_text.push('.');
            } else {
                let end = byte_pos;
                flush_token(&mut tokens, &mut current_text, current_start, end);
                push_token(&mut tokens, ch.to_string(), byte_pos, byte_pos + ch.len_utf8());
            }
        } else if ch == '\'' || ch == '\u{2019}' {
            if current_text.is_empty() {
                current_start = byte_pos;
            }
            current_text.push(ch);
        } else if ch.is_whitespace() {
            let end = byte_pos;
            flush_token(&mut tokens, &mut current_text, current_start, end);
        } else {
            let end = byte_pos;
            flush_token(&mut tokens, &mut current_text, current_start, end);
            let ch_len = ch.len_utf8();
            push_token(&mut tokens, ch.to_string(), byte_pos, byte_pos + ch_len);
        }
        i += 1;
    }

    let end = text.len();
    flush_token(&mut tokens, &mut current_text, current_start, end);

    // Re-indexa os tokens
    for (i, token) in tokens.iter_mut().enumerate() {
        token.index = i;
    }
    tokens
}

/// Fecha o token acumulado e adiciona à lista (se não vazio)
fn flush_token(tokens: &mut Vec<Token>, text: &mut String, start: usize, end: usize) {
    if !text.is_empty() {
        let t = Token {
            norm: normalize(text),
            text: text.clone(),
            start,
            end,
            index: 0, // será atribuído depois
            is_space: false,
            excluded: false,
        };
        tokens.push(t);
        text.clear();
    }
}

/// Adiciona um token de pontuação diretamente
fn push_token(tokens: &mut Vec<Token>, text: String, start: usize, end: usize) {
    let is_space = text.chars().all(char::is_whitespace);
    tokens.push(Token {
        norm: normalize(&text),
        text,
        start,
        end,
        index: 0,
        is_space,
        excluded: false,
    });
}

/// Normaliza um trecho de texto: minúsculas e sem diacríticos.
///
/// A iteração é por grafema: "é" pode chegar como um único code point (U+00E9)
/// ou como "e" + acento combinante (U+0301); nos dois casos o resultado é "e".
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for grapheme in text.graphemes(true) {
        for ch in grapheme.chars() {
            if is_combining_mark(ch) {
                continue;
            }
            let base = strip_diacritic(ch);
            for low in base.to_lowercase() {
                out.push(low);
            }
        }
    }
    out
}

/// Marcas combinantes Unicode (acentos aplicados como code point separado)
fn is_combining_mark(ch: char) -> bool {
    matches!(ch, '\u{0300}'..='\u{036F}')
}

/// Mapeia caracteres acentuados do PT-BR (pré-compostos) para a base ASCII
fn strip_diacritic(ch: char) -> char {
    match ch {
        'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
        'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => 'A',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'É' | 'È' | 'Ê' | 'Ë' => 'E',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'O',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
        'ç' => 'c',
        'Ç' => 'C',
        'ñ' => 'n',
        'Ñ' => 'N',
        other => other,
    }
}

/// Segmenta a lista de tokens em sentenças.
///
/// Retorna intervalos `(início, fim)` de índices de token, semiabertos, ordenados,
/// sem sobreposição e cobrindo todos os tokens. Um token terminador (`.`, `!`, `?`,
/// `…`) fecha a sentença corrente — abreviações como "Dr." não disparam quebra
/// porque o ponto fica dentro do próprio token.
pub fn split_sentences(tokens: &[Token]) -> Vec<(usize, usize)> {
    let mut sentences = Vec::new();
    let mut sent_start = 0;

    for (i, token) in tokens.iter().enumerate() {
        if matches!(token.text.as_str(), "." | "!" | "?" | "…") {
            sentences.push((sent_start, i + 1));
            sent_start = i + 1;
        }
    }

    if sent_start < tokens.len() {
        sentences.push((sent_start, tokens.len()));
    }
    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_basic() {
        let tokens = tokenize("Paciente pesa 70 kg.");
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["Paciente", "pesa", "70", "kg", "."]);
    }

    #[test]
    fn test_tokenize_offsets() {
        let text = "Pressão: 120x80";
        let tokens = tokenize(text);
        for token in &tokens {
            assert_eq!(&text[token.start..token.end], token.text);
        }
    }

    #[test]
    fn test_tokenize_decimal_comma() {
        let tokens = tokenize("pesa 70,5 kg");
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert!(texts.contains(&"70,5"));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("Pressão"), "pressao");
        assert_eq!(normalize("PÉ"), "pe");
        // "e" + acento combinante também reduz para "e"
        assert_eq!(normalize("pe\u{0301}"), "pe");
    }

    #[test]
    fn test_split_sentences() {
        let tokens = tokenize("O paciente melhorou. Dr. Silva confirmou alta.");
        let sentences = split_sentences(&tokens);
        assert_eq!(sentences.len(), 2);
        // "Dr." não quebra a segunda sentença
        let (s, e) = sentences[1];
        let texts: Vec<&str> = tokens[s..e].iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["Dr.", "Silva", "confirmou", "alta", "."]);
    }

    #[test]
    fn test_split_sentences_no_terminator() {
        let tokens = tokenize("sem pontuação final");
        let sentences = split_sentences(&tokens);
        assert_eq!(sentences, vec![(0, tokens.len())]);
    }
}
