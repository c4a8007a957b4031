//! # Configuração Estática do Matcher Contextual
//!
//! Define a superfície de configuração desserializável (via `serde`) que descreve
//! as fontes de padrões e suas regras de contexto:
//!
//! - **Fonte** ([`SourceConfig`]): um grupo nomeado de padrões de âncora (termos
//!   literais e/ou regexes) com listas ordenadas de regras de exclusão, inclusão
//!   e atribuição.
//! - **Janela** ([`WindowSpec`]): o trecho de contexto ao redor da âncora onde
//!   cada regra atua, como inteiro único (antes/depois) ou par `(antes, depois)`.
//! - **Regras de restrição** ([`ConstraintRule`]): regexes que vetam a âncora —
//!   por presença (exclusão) ou por ausência (inclusão) no contexto.
//! - **Regras de atribuição** ([`AssignRule`]): extraem valores auxiliares do
//!   contexto (grupo de captura de regex ou spans já extraídos).
//!
//! A validação acontece uma única vez, na construção do motor: configuração
//! malformada falha rápido com [`ConfigError`] antes de qualquer documento ser
//! processado. Rejeições em tempo de documento nunca geram erro.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document::{AlignmentMode, Attr};
use crate::matcher::RegexFlags;

/// Erros fatais de configuração, levantados uma única vez na construção do motor.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Cada fonte deve ter um rótulo `source` único na configuração inteira.
    #[error("rótulo de fonte duplicado: '{0}'")]
    DuplicateSource(String),

    /// Nomes de regras de atribuição devem ser únicos dentro da fonte.
    #[error("nome de regra de atribuição duplicado na fonte '{source_label}': '{name}'")]
    DuplicateAssignName { source_label: String, name: String },

    /// No máximo uma regra de atribuição por fonte pode ter `replace_entity = true`.
    #[error("mais de uma regra com replace_entity=true na fonte '{0}'")]
    MultipleReplaceEntity(String),

    /// Regexes de atribuição devem ter exatamente um grupo de captura.
    #[error(
        "a regex da regra de atribuição '{name}' deve ter exatamente um grupo de captura, encontrou {found}"
    )]
    BadCaptureCount { name: String, found: usize },

    /// Uma regra de atribuição precisa de exatamente uma origem de valores.
    #[error("a regra de atribuição '{0}' precisa de exatamente um entre `regex` e `span_getter`")]
    AmbiguousAssignSource(String),

    /// Janela informada como inteiro único não pode ser 0.
    #[error("a janela informada não pode ser 0")]
    ZeroWindow,

    /// Janela em par deve conter pelo menos um token.
    #[error("janela inválida ({0}, {1}): o início deve ser menor que o fim")]
    InvalidWindow(i32, i32),

    /// Regex sintaticamente inválida (propagado do compilador de regex).
    #[error("regex inválida: {0}")]
    InvalidRegex(#[from] regex::Error),
}

/// Janela de contexto como aparece na configuração.
///
/// Formas aceitas:
/// - inteiro negativo `-n`: os `n` tokens **antes** da âncora → `(-n, 0)`
/// - inteiro positivo `n`: os `n` tokens **depois** da âncora → `(0, n)`
/// - par `[antes, depois]`: deslocamentos assinados relativos ao início/fim da âncora
/// - ausente (`null`): todo o trecho permitido (sentença ou documento)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WindowSpec {
    /// Um único deslocamento assinado
    Single(i32),
    /// Par explícito `(antes, depois)`
    Pair(i32, i32),
}

impl WindowSpec {
    /// Normaliza para o par canônico `(antes, depois)`, validando os invariantes.
    pub fn normalize(self) -> Result<(i32, i32), ConfigError> {
        match self {
            WindowSpec::Single(0) => Err(ConfigError::ZeroWindow),
            WindowSpec::Single(v) if v < 0 => Ok((v, 0)),
            WindowSpec::Single(v) => Ok((0, v)),
            WindowSpec::Pair(before, after) => {
                if before < after {
                    Ok((before, after))
                } else {
                    Err(ConfigError::InvalidWindow(before, after))
                }
            }
        }
    }
}

/// Normaliza uma janela opcional (ausente = trecho permitido inteiro).
pub fn normalize_window(spec: Option<WindowSpec>) -> Result<Option<(i32, i32)>, ConfigError> {
    spec.map(WindowSpec::normalize).transpose()
}

/// Modo de redução configurável para múltiplas ocorrências da mesma chave.
///
/// A ausência do campo (`null`) significa "manter todas em lista ordenada".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReduceMode {
    /// Vence a ocorrência com menor offset de início do match completo.
    KeepFirst,
    /// Vence a ocorrência com maior offset de início do match completo.
    KeepLast,
}

fn default_true() -> bool {
    true
}

/// Regra de restrição sobre o contexto da âncora.
///
/// Usada nas duas listas de uma fonte, com semânticas espelhadas:
/// - em `exclude`: se **alguma** alternativa casar na janela, a âncora é descartada;
/// - em `include`: se **nenhuma** alternativa casar na janela, a âncora é descartada.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintRule {
    /// Alternativas de regex (basta uma casar)
    #[serde(default)]
    pub regex: Vec<String>,
    /// Janela de contexto onde procurar
    #[serde(default)]
    pub window: Option<WindowSpec>,
    /// Limita a busca à sentença da âncora
    #[serde(default = "default_true")]
    pub limit_to_sentence: bool,
    /// Sobrescreve as flags de regex da fonte/motor
    #[serde(default)]
    pub regex_flags: Option<RegexFlags>,
    /// Sobrescreve o atributo de casamento da fonte/motor
    #[serde(default)]
    pub regex_attr: Option<Attr>,
}

impl Default for ConstraintRule {
    fn default() -> Self {
        Self {
            regex: Vec::new(),
            window: None,
            limit_to_sentence: true,
            regex_flags: None,
            regex_attr: None,
        }
    }
}

/// Regra de atribuição: extrai um valor auxiliar do contexto da âncora.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignRule {
    /// Chave única (dentro da fonte) sob a qual o valor é registrado
    pub name: String,
    /// Regex com exatamente um grupo de captura (o valor extraído)
    #[serde(default)]
    pub regex: Option<String>,
    /// Alternativa à regex: nome de um grupo de spans já extraídos do documento
    #[serde(default)]
    pub span_getter: Option<String>,
    /// Janela de contexto onde procurar
    #[serde(default)]
    pub window: Option<WindowSpec>,
    /// Limita a busca à sentença da âncora
    #[serde(default = "default_true")]
    pub limit_to_sentence: bool,
    /// Sobrescreve as flags de regex da fonte/motor
    #[serde(default)]
    pub regex_flags: Option<RegexFlags>,
    /// Sobrescreve o atributo de casamento da fonte/motor
    #[serde(default)]
    pub regex_attr: Option<Attr>,
    /// O span desta atribuição substitui a âncora como entidade final
    /// (no máximo uma regra por fonte)
    #[serde(default)]
    pub replace_entity: bool,
    /// Como reduzir múltiplas ocorrências (`null` = manter todas em lista)
    #[serde(default)]
    pub reduce_mode: Option<ReduceMode>,
    /// Se verdadeiro, a âncora é descartada quando esta regra não casa
    #[serde(default)]
    pub required: bool,
}

impl Default for AssignRule {
    fn default() -> Self {
        Self {
            name: String::new(),
            regex: None,
            span_getter: None,
            window: None,
            limit_to_sentence: true,
            regex_flags: None,
            regex_attr: None,
            replace_entity: false,
            reduce_mode: None,
            required: false,
        }
    }
}

/// Uma fonte de padrões: âncoras + regras de contexto.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Rótulo único da fonte (vira a etiqueta provisória das âncoras)
    pub source: String,
    /// Termos literais para o casador de frases
    #[serde(default)]
    pub terms: Vec<String>,
    /// Regexes de âncora
    #[serde(default)]
    pub regex: Vec<String>,
    /// Atributo de casamento das regexes desta fonte (sobrescreve o do motor)
    #[serde(default)]
    pub regex_attr: Option<Attr>,
    /// Flags de regex desta fonte (sobrescreve as do motor)
    #[serde(default)]
    pub regex_flags: Option<RegexFlags>,
    /// Regras de exclusão, em ordem de avaliação
    #[serde(default)]
    pub exclude: Vec<ConstraintRule>,
    /// Regras de inclusão, em ordem de avaliação
    #[serde(default)]
    pub include: Vec<ConstraintRule>,
    /// Regras de atribuição, em ordem de avaliação
    #[serde(default)]
    pub assign: Vec<AssignRule>,
}

/// Configuração completa do matcher contextual.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Rótulo final atribuído às entidades emitidas
    pub label: String,
    /// Fontes de padrões, em ordem de configuração
    pub sources: Vec<SourceConfig>,
    /// Atributo de casamento padrão (`norm` por omissão)
    #[serde(default)]
    pub attr: Attr,
    /// Flags de regex padrão
    #[serde(default)]
    pub regex_flags: RegexFlags,
    /// Pula tokens marcados como excluídos durante o casamento
    #[serde(default)]
    pub ignore_excluded: bool,
    /// Pula tokens de espaço durante o casamento
    #[serde(default)]
    pub ignore_space_tokens: bool,
    /// Arredondamento de matches fora de fronteira de token
    #[serde(default)]
    pub alignment_mode: AlignmentMode,
    /// Incorpora os spans atribuídos à entidade final (substituição/expansão)
    #[serde(default)]
    pub include_assigned: bool,
    /// Expõe os valores atribuídos como spans em vez de texto
    #[serde(default)]
    pub assign_as_span: bool,
}

impl MatcherConfig {
    /// Desserializa a configuração a partir de JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_normalize_single() {
        assert_eq!(WindowSpec::Single(-3).normalize().unwrap(), (-3, 0));
        assert_eq!(WindowSpec::Single(5).normalize().unwrap(), (0, 5));
    }

    #[test]
    fn test_window_zero_rejeitada() {
        assert!(matches!(
            WindowSpec::Single(0).normalize(),
            Err(ConfigError::ZeroWindow)
        ));
    }

    #[test]
    fn test_window_pair_invertida_rejeitada() {
        assert!(matches!(
            WindowSpec::Pair(3, -2).normalize(),
            Err(ConfigError::InvalidWindow(3, -2))
        ));
        assert_eq!(WindowSpec::Pair(-2, 3).normalize().unwrap(), (-2, 3));
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "label": "medida",
            "sources": [{
                "source": "peso",
                "terms": ["pesa"],
                "assign": [{
                    "name": "valor",
                    "regex": "(\\d+)",
                    "window": 3
                }]
            }]
        }"#;
        let config = MatcherConfig::from_json(json).unwrap();
        assert_eq!(config.label, "medida");
        assert_eq!(config.sources[0].assign[0].window, Some(WindowSpec::Single(3)));
        // limit_to_sentence é verdadeiro por omissão
        assert!(config.sources[0].assign[0].limit_to_sentence);
    }
}
