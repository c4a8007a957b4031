//! # Casadores Primitivos — Frases Literais e Regex
//!
//! Os dois casadores que localizam ocorrências sobre o documento tokenizado:
//!
//! - [`PhraseMatcher`]: casa sequências literais de tokens (termos), por varredura
//!   de n-gramas sob a projeção de atributo escolhida.
//! - [`RegexMatcher`]: casa expressões regulares sobre o texto *renderizado* de um
//!   intervalo de tokens e mapeia os matches de volta para índices de token via a
//!   tabela de offsets do snippet, segundo o modo de alinhamento.
//!
//! Ambos são construídos uma única vez, na montagem do motor, e ficam imutáveis:
//! cada regra carrega seu próprio casador já compilado.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::document::{AlignmentMode, Attr, Document, TokenSpan};
use crate::tokenizer::normalize;

/// Flags de compilação de regex expostas na configuração.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegexFlags {
    /// Casamento sem distinção de maiúsculas/minúsculas (`(?i)`)
    #[serde(default)]
    pub case_insensitive: bool,
    /// `^`/`$` casam em quebras de linha (`(?m)`)
    #[serde(default)]
    pub multi_line: bool,
    /// `.` casa quebras de linha (`(?s)`)
    #[serde(default)]
    pub dot_matches_new_line: bool,
}

impl RegexFlags {
    /// Compila um padrão com estas flags.
    pub fn compile(&self, pattern: &str) -> Result<Regex, regex::Error> {
        RegexBuilder::new(pattern)
            .case_insensitive(self.case_insensitive)
            .multi_line(self.multi_line)
            .dot_matches_new_line(self.dot_matches_new_line)
            .build()
    }
}

/// Casador de frases literais: sequências de tokens comparadas sob um atributo.
///
/// Os termos são projetados na construção (ex: normalizados quando `attr = Norm`)
/// e o casamento é uma varredura de n-gramas sobre os tokens visíveis do intervalo.
#[derive(Debug)]
pub struct PhraseMatcher {
    attr: Attr,
    ignore_excluded: bool,
    ignore_space_tokens: bool,
    /// (chave da fonte, termos já tokenizados e projetados)
    patterns: Vec<(String, Vec<Vec<String>>)>,
}

impl PhraseMatcher {
    pub fn new(attr: Attr, ignore_excluded: bool, ignore_space_tokens: bool) -> Self {
        Self {
            attr,
            ignore_excluded,
            ignore_space_tokens,
            patterns: Vec::new(),
        }
    }

    /// Registra os termos de uma fonte, projetando-os sob o atributo do casador.
    pub fn add_terms(&mut self, key: &str, terms: &[String]) {
        let projected: Vec<Vec<String>> = terms
            .iter()
            .map(|term| {
                term.split_whitespace()
                    .map(|word| match self.attr {
                        Attr::Text => word.to_string(),
                        Attr::Norm => normalize(word),
                    })
                    .collect()
            })
            .filter(|words: &Vec<String>| !words.is_empty())
            .collect();
        if !projected.is_empty() {
            self.patterns.push((key.to_string(), projected));
        }
    }

    /// Todas as ocorrências dentro do intervalo, em ordem de documento.
    ///
    /// Retorna pares `(chave da fonte, span casado)`.
    pub fn find(&self, doc: &Document, span: &TokenSpan) -> Vec<(String, TokenSpan)> {
        // Índices dos tokens visíveis (não pulados) do intervalo
        let end = span.end.min(doc.len());
        let visible: Vec<usize> = (span.start.min(end)..end)
            .filter(|&i| {
                let token = &doc.tokens()[i];
                !(self.ignore_excluded && token.excluded)
                    && !(self.ignore_space_tokens && token.is_space)
            })
            .collect();

        let mut matches = Vec::new();
        for pos in 0..visible.len() {
            for (key, terms) in &self.patterns {
                for term in terms {
                    if pos + term.len() > visible.len() {
                        continue;
                    }
                    let hit = term.iter().enumerate().all(|(j, word)| {
                        let token = &doc.tokens()[visible[pos + j]];
                        match self.attr {
                            Attr::Text => token.text == *word,
                            Attr::Norm => token.norm == *word,
                        }
                    });
                    if hit {
                        matches.push((
                            key.clone(),
                            TokenSpan::new(visible[pos], visible[pos + term.len() - 1] + 1),
                        ));
                    }
                }
            }
        }
        matches
    }
}

/// Uma ocorrência de regex mapeada de volta para tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct RegexMatch {
    /// Chave do conjunto de padrões que casou
    pub key: String,
    /// Span do match completo, alinhado a fronteiras de token
    pub span: TokenSpan,
    /// Span do primeiro grupo de captura, quando exercido e alinhável
    pub group: Option<TokenSpan>,
}

/// Um conjunto de padrões compilados sob uma mesma chave.
#[derive(Debug)]
struct PatternSet {
    key: String,
    attr: Attr,
    regexes: Vec<Regex>,
}

/// Casador de regex sobre texto renderizado, com mapeamento de volta para tokens.
#[derive(Debug)]
pub struct RegexMatcher {
    ignore_excluded: bool,
    ignore_space_tokens: bool,
    alignment: AlignmentMode,
    patterns: Vec<PatternSet>,
}

impl RegexMatcher {
    pub fn new(
        ignore_excluded: bool,
        ignore_space_tokens: bool,
        alignment: AlignmentMode,
    ) -> Self {
        Self {
            ignore_excluded,
            ignore_space_tokens,
            alignment,
            patterns: Vec::new(),
        }
    }

    /// Compila e registra um conjunto de padrões sob uma chave, com o atributo
    /// de projeção e as flags já resolvidos pela cadeia regra → fonte → motor.
    pub fn add_patterns(
        &mut self,
        key: &str,
        patterns: &[String],
        attr: Attr,
        flags: RegexFlags,
    ) -> Result<(), ConfigError> {
        let regexes: Vec<Regex> = patterns
            .iter()
            .map(|p| flags.compile(p))
            .collect::<Result<_, _>>()?;
        if !regexes.is_empty() {
            self.patterns.push(PatternSet {
                key: key.to_string(),
                attr,
                regexes,
            });
        }
        Ok(())
    }

    /// Todas as ocorrências dentro do intervalo: conjuntos de padrões em ordem de
    /// registro, matches em ordem de documento dentro de cada conjunto.
    ///
    /// Matches que não alinham a nenhum token (largura zero, ou rejeitados pelos
    /// modos `contract`/`strict`) são descartados.
    pub fn find(&self, doc: &Document, span: &TokenSpan) -> Vec<RegexMatch> {
        let mut matches = Vec::new();
        for set in &self.patterns {
            let snippet = doc.render(
                span,
                set.attr,
                self.ignore_excluded,
                self.ignore_space_tokens,
            );
            if snippet.is_empty() {
                continue;
            }
            for regex in &set.regexes {
                for caps in regex.captures_iter(&snippet.text) {
                    let full = caps.get(0).expect("grupo 0 sempre presente");
                    let Some(full_span) = snippet.align(full.start(), full.end(), self.alignment)
                    else {
                        continue;
                    };
                    let group = caps
                        .get(1)
                        .and_then(|g| snippet.align(g.start(), g.end(), self.alignment));
                    matches.push(RegexMatch {
                        key: set.key.clone(),
                        span: full_span,
                        group,
                    });
                }
            }
        }
        matches
    }

    /// Verdadeiro se alguma ocorrência alinhável existe no intervalo
    /// (curto-circuito no primeiro match).
    pub fn has_match(&self, doc: &Document, span: &TokenSpan) -> bool {
        for set in &self.patterns {
            let snippet = doc.render(
                span,
                set.attr,
                self.ignore_excluded,
                self.ignore_space_tokens,
            );
            if snippet.is_empty() {
                continue;
            }
            for regex in &set.regexes {
                for m in regex.find_iter(&snippet.text) {
                    if snippet.align(m.start(), m.end(), self.alignment).is_some() {
                        return true;
                    }
                }
            }
        }
        false
    }
}
