//! # Política de Redução — Acumulador de Atribuições
//!
//! Quando uma mesma chave de atribuição casa várias vezes no contexto de uma
//! âncora, o [`AssignDict`] decide o que guardar segundo a política fixada para
//! a chave na construção:
//!
//! - **Lista** (omissão): todas as ocorrências, em ordem de descoberta.
//! - **KeepFirst**: vence a ocorrência cujo match completo começa mais à esquerda.
//! - **KeepLast**: vence a que começa mais à direita.
//!
//! As duas políticas de substituição comparam exclusivamente o offset de início
//! do match completo — a inserção é idempotente em relação à ordem de descoberta.
//! Empate exato de offsets: a substituição usa `<=`/`>=`, então vence a ocorrência
//! considerada por último (comportamento documentado e testado).

use std::collections::BTreeMap;

use crate::config::ReduceMode;
use crate::document::TokenSpan;

/// Política de redução interna, com despacho explícito por `match`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    /// Mantém todas as ocorrências em lista ordenada
    List,
    /// Mantém a de menor offset de início
    KeepFirst,
    /// Mantém a de maior offset de início
    KeepLast,
}

impl From<Option<ReduceMode>> for Reduction {
    fn from(mode: Option<ReduceMode>) -> Self {
        match mode {
            None => Reduction::List,
            Some(ReduceMode::KeepFirst) => Reduction::KeepFirst,
            Some(ReduceMode::KeepLast) => Reduction::KeepLast,
        }
    }
}

/// Registro acumulado para uma ocorrência de atribuição.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignRecord {
    /// Span do match completo
    pub span: TokenSpan,
    /// Span do valor (grupo de captura, ou o match completo no caso degenerado)
    pub value_span: TokenSpan,
    /// Texto do valor sob o atributo da fonte
    pub value_text: String,
}

/// Conteúdo reduzido de uma chave.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    /// Política de lista: todas as ocorrências em ordem de inserção
    List(Vec<AssignRecord>),
    /// Políticas keep_first/keep_last: a ocorrência vencedora
    Single(AssignRecord),
}

impl Slot {
    /// Spans de match completo deste slot (um ou todos).
    pub fn spans(&self) -> Vec<TokenSpan> {
        match self {
            Slot::List(records) => records.iter().map(|r| r.span).collect(),
            Slot::Single(record) => vec![record.span],
        }
    }
}

/// Acumulador chaveado com política de redução fixa por chave.
///
/// A política de cada chave é definida na construção e nunca muda no meio de um
/// documento. A leitura de chave ausente devolve o padrão adequado à política
/// (lista vazia / nenhum registro) em vez de falhar. A iteração é determinística
/// (chaves em ordem lexicográfica).
#[derive(Debug)]
pub struct AssignDict {
    modes: BTreeMap<String, Reduction>,
    slots: BTreeMap<String, Slot>,
}

impl AssignDict {
    /// Cria o acumulador com as políticas por chave.
    pub fn new(modes: BTreeMap<String, Reduction>) -> Self {
        Self {
            modes,
            slots: BTreeMap::new(),
        }
    }

    /// Política configurada para a chave (lista, se desconhecida).
    pub fn mode(&self, key: &str) -> Reduction {
        self.modes.get(key).copied().unwrap_or(Reduction::List)
    }

    /// Insere uma ocorrência, aplicando a política da chave.
    pub fn insert(&mut self, key: &str, record: AssignRecord) {
        match self.mode(key) {
            Reduction::List => match self.slots.get_mut(key) {
                Some(Slot::List(records)) => records.push(record),
                _ => {
                    self.slots.insert(key.to_string(), Slot::List(vec![record]));
                }
            },
            Reduction::KeepFirst => {
                let replace = match self.slots.get(key) {
                    Some(Slot::Single(old)) => record.span.start <= old.span.start,
                    _ => true,
                };
                if replace {
                    self.slots.insert(key.to_string(), Slot::Single(record));
                }
            }
            Reduction::KeepLast => {
                let replace = match self.slots.get(key) {
                    Some(Slot::Single(old)) => record.span.start >= old.span.start,
                    _ => true,
                };
                if replace {
                    self.slots.insert(key.to_string(), Slot::Single(record));
                }
            }
        }
    }

    /// Slot reduzido de uma chave, se ela casou ao menos uma vez.
    pub fn get(&self, key: &str) -> Option<&Slot> {
        self.slots.get(key)
    }

    /// Verdadeiro se a chave recebeu ao menos uma ocorrência.
    pub fn is_matched(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    /// Spans de match completo registrados sob a chave (vazio se nunca casou).
    pub fn spans(&self, key: &str) -> Vec<TokenSpan> {
        self.slots.get(key).map(|s| s.spans()).unwrap_or_default()
    }

    /// Itera os slots preenchidos em ordem determinística de chave.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Slot)> {
        self.slots.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(start: usize) -> AssignRecord {
        AssignRecord {
            span: TokenSpan::new(start, start + 1),
            value_span: TokenSpan::new(start, start + 1),
            value_text: format!("v{start}"),
        }
    }

    fn dict(mode: Reduction) -> AssignDict {
        let mut modes = BTreeMap::new();
        modes.insert("chave".to_string(), mode);
        AssignDict::new(modes)
    }

    #[test]
    fn test_keep_first() {
        let mut dict = dict(Reduction::KeepFirst);
        for start in [5, 2, 8] {
            dict.insert("chave", record(start));
        }
        match dict.get("chave").unwrap() {
            Slot::Single(rec) => assert_eq!(rec.span.start, 2),
            _ => panic!("esperava Slot::Single"),
        }
    }

    #[test]
    fn test_keep_last() {
        let mut dict = dict(Reduction::KeepLast);
        for start in [5, 2, 8] {
            dict.insert("chave", record(start));
        }
        match dict.get("chave").unwrap() {
            Slot::Single(rec) => assert_eq!(rec.span.start, 8),
            _ => panic!("esperava Slot::Single"),
        }
    }

    #[test]
    fn test_lista_preserva_ordem_de_insercao() {
        let mut dict = dict(Reduction::List);
        for start in [5, 2, 8] {
            dict.insert("chave", record(start));
        }
        match dict.get("chave").unwrap() {
            Slot::List(records) => {
                let starts: Vec<usize> = records.iter().map(|r| r.span.start).collect();
                assert_eq!(starts, vec![5, 2, 8]);
            }
            _ => panic!("esperava Slot::List"),
        }
    }

    #[test]
    fn test_empate_vence_o_ultimo_considerado() {
        // Dois candidatos com o mesmo início: a substituição em <=/>= faz o
        // último considerado vencer, nas duas políticas.
        for mode in [Reduction::KeepFirst, Reduction::KeepLast] {
            let mut dict = dict(mode);
            let mut first = record(4);
            first.value_text = "primeiro".to_string();
            let mut second = record(4);
            second.value_text = "segundo".to_string();
            dict.insert("chave", first);
            dict.insert("chave", second);
            match dict.get("chave").unwrap() {
                Slot::Single(rec) => assert_eq!(rec.value_text, "segundo"),
                _ => panic!("esperava Slot::Single"),
            }
        }
    }

    #[test]
    fn test_chave_ausente() {
        let dict = dict(Reduction::List);
        assert!(dict.get("chave").is_none());
        assert!(dict.spans("chave").is_empty());
        assert!(!dict.is_matched("chave"));
    }

    #[test]
    fn test_idempotente_a_ordem_de_descoberta() {
        // keep_first com inserções em qualquer ordem converge para o mesmo início
        for ordem in [[5, 2, 8], [8, 5, 2], [2, 8, 5]] {
            let mut dict = dict(Reduction::KeepFirst);
            for start in ordem {
                dict.insert("chave", record(start));
            }
            match dict.get("chave").unwrap() {
                Slot::Single(rec) => assert_eq!(rec.span.start, 2),
                _ => panic!("esperava Slot::Single"),
            }
        }
    }
}
