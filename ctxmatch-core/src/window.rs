//! # Resolução de Janelas de Contexto
//!
//! Converte uma janela configurada `(antes, depois)` em um intervalo concreto de
//! tokens ao redor de uma âncora, com recorte pelos limites da sentença da âncora
//! (quando `limit_to_sentence`) ou do documento inteiro.
//!
//! A resolução é uma função pura; como o mesmo par âncora/janela se repete entre a
//! avaliação de regras de exclusão, inclusão e atribuição, o motor usa um
//! [`WindowCache`] limitado por execução para memoizar os resultados.

use std::collections::HashMap;

use crate::document::{Document, TokenSpan};

/// Capacidade do cache de memoização (entradas por execução).
const WINDOW_CACHE_CAP: usize = 64;

/// Resolve a janela de contexto de uma âncora.
///
/// `start = max(anchor.start + antes, limite_inferior)` e
/// `end = min(anchor.end + depois, limite_superior)`, onde os limites são os da
/// sentença da âncora quando `limit_to_sentence`, senão os do documento. Janela
/// ausente colapsa para o trecho permitido inteiro. Um cruzamento degenerado
/// (início além do fim) produz um intervalo vazio no ponto de recorte.
pub fn resolve_window(
    doc: &Document,
    anchor: &TokenSpan,
    window: Option<(i32, i32)>,
    limit_to_sentence: bool,
) -> TokenSpan {
    let (lower, upper) = if limit_to_sentence {
        doc.sentence_of(anchor)
    } else {
        (0, doc.len())
    };

    match window {
        None => TokenSpan::new(lower, upper),
        Some((before, after)) => {
            let start = (anchor.start as i64 + before as i64)
                .clamp(lower as i64, upper as i64) as usize;
            let end = (anchor.end as i64 + after as i64)
                .clamp(lower as i64, upper as i64) as usize;
            TokenSpan::new(start, end.max(start))
        }
    }
}

/// Cache de memoização limitado para resoluções de janela de uma execução.
///
/// Chaveado por valor em `(âncora, janela, limitar à sentença)`; como a resolução
/// é pura, o cache nunca devolve resultado divergente. Ao atingir a capacidade,
/// novas entradas simplesmente não são memorizadas.
#[derive(Debug, Default)]
pub struct WindowCache {
    map: HashMap<(TokenSpan, Option<(i32, i32)>, bool), TokenSpan>,
}

impl WindowCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolução com memoização.
    pub fn resolve(
        &mut self,
        doc: &Document,
        anchor: &TokenSpan,
        window: Option<(i32, i32)>,
        limit_to_sentence: bool,
    ) -> TokenSpan {
        let key = (*anchor, window, limit_to_sentence);
        if let Some(cached) = self.map.get(&key) {
            return *cached;
        }
        let resolved = resolve_window(doc, anchor, window, limit_to_sentence);
        if self.map.len() < WINDOW_CACHE_CAP {
            self.map.insert(key, resolved);
        }
        resolved
    }
}
