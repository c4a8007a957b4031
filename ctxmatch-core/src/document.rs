//! # Modelo de Documento Tokenizado
//!
//! O `Document` é a visão endereçável do texto sobre a qual o matcher trabalha:
//! tokens com offsets, intervalos de sentença, grupos nomeados de spans já
//! extraídos e a projeção de atributo (texto cru vs. normalizado).
//!
//! ## Projeção de atributo
//!
//! Todo casamento (frase ou regex) acontece sobre uma *renderização* de um
//! intervalo de tokens: o texto cru (`Attr::Text`) ou a forma normalizada
//! (`Attr::Norm`, minúsculas sem acento). A renderização devolve um [`Snippet`]
//! que guarda, para cada token, o intervalo de bytes que ele ocupa no texto
//! renderizado — é essa tabela que permite mapear um match de regex de volta
//! para índices de token.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::tokenizer::{split_sentences, tokenize, Token};

/// Um intervalo de tokens `[start, end)` dentro de um documento.
///
/// # Exemplo
/// Em "o paciente pesa 70 kg", o span de "pesa 70":
/// `TokenSpan { start: 2, end: 4 }`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TokenSpan {
    /// Índice do token inicial (inclusivo)
    pub start: usize,
    /// Índice do token final (exclusivo)
    pub end: usize,
}

impl TokenSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Verifica se `other` está inteiramente contido neste intervalo
    pub fn contains(&self, other: &TokenSpan) -> bool {
        other.start >= self.start && other.end <= self.end
    }
}

/// Atributo de projeção do texto usado no casamento.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attr {
    /// Texto original, como digitado.
    Text,
    /// Forma normalizada: minúsculas, sem diacríticos.
    Norm,
}

impl Default for Attr {
    fn default() -> Self {
        Attr::Norm
    }
}

/// Política de arredondamento quando um match de regex não cai exatamente
/// em fronteiras de token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentMode {
    /// Expande para cobrir todo token parcialmente atingido.
    Expand,
    /// Contrai para apenas os tokens inteiramente cobertos; descarta o match se não sobrar nenhum.
    Contract,
    /// Exige alinhamento exato com fronteiras de token; descarta o match caso contrário.
    Strict,
}

impl Default for AlignmentMode {
    fn default() -> Self {
        AlignmentMode::Expand
    }
}

/// Renderização de um intervalo de tokens, com a tabela de offsets necessária
/// para mapear bytes do texto renderizado de volta para tokens do documento.
#[derive(Debug, Clone)]
pub struct Snippet {
    /// Texto renderizado (tokens unidos por um espaço).
    pub text: String,
    /// Para cada token renderizado: (índice do token no documento, byte inicial, byte final).
    offsets: Vec<(usize, usize, usize)>,
}

impl Snippet {
    /// Mapeia um intervalo de bytes `[start, end)` do texto renderizado para um
    /// intervalo de tokens do documento, segundo o modo de alinhamento.
    ///
    /// Retorna `None` quando o intervalo não toca token algum (ex: match vazio ou
    /// inteiramente sobre o espaço separador), quando `Contract` não cobre nenhum
    /// token inteiro, ou quando `Strict` não casa exatamente com as fronteiras.
    pub fn align(&self, start: usize, end: usize, mode: AlignmentMode) -> Option<TokenSpan> {
        let overlapping: Vec<&(usize, usize, usize)> = self
            .offsets
            .iter()
            .filter(|(_, s, e)| *e > start && *s < end)
            .collect();

        match mode {
            AlignmentMode::Expand => {
                let first = overlapping.first()?;
                let last = overlapping.last()?;
                Some(TokenSpan::new(first.0, last.0 + 1))
            }
            AlignmentMode::Contract => {
                let inside: Vec<&&(usize, usize, usize)> = overlapping
                    .iter()
                    .filter(|(_, s, e)| *s >= start && *e <= end)
                    .collect();
                let first = inside.first()?;
                let last = inside.last()?;
                Some(TokenSpan::new(first.0, last.0 + 1))
            }
            AlignmentMode::Strict => {
                let first = overlapping.first()?;
                let last = overlapping.last()?;
                if first.1 == start && last.2 == end {
                    Some(TokenSpan::new(first.0, last.0 + 1))
                } else {
                    None
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Documento tokenizado: texto + tokens + sentenças + grupos de spans.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    text: String,
    tokens: Vec<Token>,
    /// Intervalos de sentença em índices de token, ordenados e sem sobreposição.
    sentences: Vec<(usize, usize)>,
    /// Spans já extraídos por outros componentes, acessíveis por nome
    /// (consumidos pelas regras de atribuição com `span_getter`).
    span_groups: BTreeMap<String, Vec<TokenSpan>>,
}

impl Document {
    /// Constrói o documento tokenizando e segmentando o texto.
    pub fn new(text: &str) -> Self {
        let tokens = tokenize(text);
        let sentences = split_sentences(&tokens);
        Self {
            text: text.to_string(),
            tokens,
            sentences,
            span_groups: BTreeMap::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Número de tokens do documento
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Intervalo de tokens cobrindo o documento inteiro
    pub fn full_span(&self) -> TokenSpan {
        TokenSpan::new(0, self.tokens.len())
    }

    /// Sentença que contém o primeiro token do span.
    ///
    /// Documentos vazios (ou spans fora do intervalo) caem no documento inteiro.
    pub fn sentence_of(&self, span: &TokenSpan) -> (usize, usize) {
        self.sentences
            .iter()
            .find(|(_, end)| *end > span.start)
            .copied()
            .unwrap_or((0, self.tokens.len()))
    }

    /// Marca um intervalo de tokens como excluído do casamento
    /// (ex: trecho de poluição detectado por um normalizador externo).
    pub fn mark_excluded(&mut self, span: TokenSpan) {
        let end = span.end.min(self.tokens.len());
        for token in &mut self.tokens[span.start.min(end)..end] {
            token.excluded = true;
        }
    }

    /// Registra um grupo nomeado de spans já extraídos.
    pub fn add_span_group(&mut self, name: &str, spans: Vec<TokenSpan>) {
        self.span_groups.insert(name.to_string(), spans);
    }

    /// Spans de um grupo nomeado (vazio se o grupo não existe).
    pub fn span_group(&self, name: &str) -> &[TokenSpan] {
        self.span_groups
            .get(name)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Renderiza um intervalo de tokens sob a projeção de atributo dada.
    ///
    /// Tokens pulados (excluídos/espaço, conforme flags) não entram no texto nem
    /// na tabela de offsets. Os tokens restantes são unidos por um único espaço.
    pub fn render(
        &self,
        span: &TokenSpan,
        attr: Attr,
        ignore_excluded: bool,
        ignore_space_tokens: bool,
    ) -> Snippet {
        let mut text = String::new();
        let mut offsets = Vec::new();

        let end = span.end.min(self.tokens.len());
        for token in &self.tokens[span.start.min(end)..end] {
            if ignore_excluded && token.excluded {
                continue;
            }
            if ignore_space_tokens && token.is_space {
                continue;
            }
            if !text.is_empty() {
                text.push(' ');
            }
            let projected = match attr {
                Attr::Text => token.text.as_str(),
                Attr::Norm => token.norm.as_str(),
            };
            let start_byte = text.len();
            text.push_str(projected);
            offsets.push((token.index, start_byte, text.len()));
        }

        Snippet { text, offsets }
    }

    /// Texto de um span sob a projeção dada (sem tabela de offsets).
    pub fn text_of(&self, span: &TokenSpan, attr: Attr, ignore_excluded: bool) -> String {
        self.render(span, attr, ignore_excluded, false).text
    }

    /// Intervalo de bytes de um span no texto original.
    pub fn byte_range(&self, span: &TokenSpan) -> (usize, usize) {
        if span.is_empty() || span.start >= self.tokens.len() {
            return (0, 0);
        }
        let last = span.end.min(self.tokens.len()) - 1;
        (self.tokens[span.start].start, self.tokens[last].end)
    }

    /// Texto original coberto por um span (recorte direto por bytes).
    pub fn original_text(&self, span: &TokenSpan) -> String {
        let (start, end) = self.byte_range(span);
        self.text[start..end].to_string()
    }
}
