//! # Matcher Contextual — Orquestrador com Eventos Observáveis
//!
//! O motor coordena as etapas do enriquecimento contextual e emite eventos em
//! cada passo via um canal Rust (`mpsc`), permitindo que o servidor WebSocket
//! transmita o progresso em tempo real para o cliente.
//!
//! ## As etapas, por âncora
//!
//! 1. **Descoberta**: os casadores primitivos (frases e regex) localizam as
//!    âncoras de todas as fontes.
//! 2. **Filtragem**: regras de exclusão (presença veta) e inclusão (ausência
//!    veta) avaliadas nas suas janelas, em ordem de configuração, com
//!    curto-circuito no primeiro veredito.
//! 3. **Coleta**: cada regra de atribuição procura valores na sua janela; regras
//!    `required` sem ocorrência descartam a âncora inteira.
//! 4. **Redução**: as ocorrências são acumuladas por chave no [`AssignDict`]
//!    segundo a política de cada regra.
//! 5. **Resolução**: a âncora é descartada, substituída pelos spans da regra
//!    `replace_entity`, ou expandida para cobrir as atribuições.
//!
//! Todos os descartes em tempo de documento são silenciosos: a âncora apenas não
//! aparece na saída (o evento [`MatchEvent::AnchorRejected`] existe só para
//! visualização). Configuração malformada, ao contrário, falha na construção.

use std::collections::{BTreeMap, HashSet};
use std::sync::mpsc;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, MatcherConfig, SourceConfig};
use crate::document::{AlignmentMode, Attr, Document, TokenSpan};
use crate::matcher::{PhraseMatcher, RegexMatcher};
use crate::reduce::{AssignDict, AssignRecord, Reduction, Slot};
use crate::window::WindowCache;

/// Valor atribuído exposto em cada span emitido.
///
/// A representação (texto ou span) é escolhida pelo chamador via
/// `assign_as_span`; políticas de lista expõem a coleção inteira.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AssignedValue {
    /// Texto de um único valor
    Text(String),
    /// Span de um único valor
    Span(TokenSpan),
    /// Textos de todos os valores (política de lista)
    Texts(Vec<String>),
    /// Spans de todos os valores (política de lista)
    Spans(Vec<TokenSpan>),
}

/// Um span final emitido pelo matcher, com sua origem e valores atribuídos.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSpan {
    /// Texto original coberto pelo span
    pub text: String,
    /// Rótulo de saída do motor
    pub label: String,
    /// Fonte de padrões que originou a âncora
    pub source: String,
    /// Intervalo de tokens
    pub span: TokenSpan,
    /// Posição de byte inicial no texto original
    pub start: usize,
    /// Posição de byte final no texto original
    pub end: usize,
    /// Valores extraídos do contexto, por chave de regra
    pub assigned: BTreeMap<String, AssignedValue>,
}

/// Motivo de descarte de uma âncora (apenas para visualização).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    /// Uma regra de exclusão casou na janela
    ExcludeHit,
    /// Uma regra de inclusão não casou na janela
    IncludeMiss,
    /// Uma regra de atribuição obrigatória não casou
    RequiredMiss { key: String },
    /// A fonte declara `replace_entity` mas a regra nunca casou
    ReplaceMiss { key: String },
}

/// Uma âncora descoberta, antes da filtragem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorInfo {
    pub source: String,
    pub text: String,
    pub span: TokenSpan,
}

/// Eventos emitidos pelo motor durante o processamento.
///
/// Estes eventos permitem que a UI (frontend) visualize o "raciocínio" do matcher
/// passo-a-passo. Cada variante carrega os dados necessários para renderizar uma
/// etapa da visualização.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum MatchEvent {
    /// **Passo 1**: Descoberta de âncoras concluída.
    AnchorsFound {
        anchors: Vec<AnchorInfo>,
        total: usize,
    },
    /// **Passo 2/3 (Opcional)**: Uma âncora foi descartada e o motivo.
    AnchorRejected {
        source: String,
        text: String,
        span: TokenSpan,
        reason: RejectReason,
    },
    /// **Passo 3**: Uma regra de atribuição casou no contexto de uma âncora.
    AssignMatched {
        source: String,
        key: String,
        text: String,
        span: TokenSpan,
    },
    /// **Passo 5**: Um span final foi emitido.
    SpanEmitted { span: ResultSpan },
    /// **Conclusão**: O processo terminou com sucesso.
    Done {
        spans: Vec<ResultSpan>,
        total_anchors: usize,
        processing_ms: u64,
    },
}

/// Regra de restrição compilada (exclusão ou inclusão).
struct CompiledConstraint {
    window: Option<(i32, i32)>,
    limit_to_sentence: bool,
    matcher: RegexMatcher,
}

/// Origem de valores de uma regra de atribuição compilada.
enum AssignKind {
    /// Regex própria, já compilada
    Regex(RegexMatcher),
    /// Spans já extraídos, por nome de grupo do documento
    SpanGroup(String),
}

/// Regra de atribuição compilada.
struct CompiledAssign {
    name: String,
    window: Option<(i32, i32)>,
    limit_to_sentence: bool,
    required: bool,
    replace_entity: bool,
    kind: AssignKind,
}

/// Uma fonte compilada: regras imutáveis com seus casadores próprios.
struct CompiledSource {
    source: String,
    exclude: Vec<CompiledConstraint>,
    include: Vec<CompiledConstraint>,
    assign: Vec<CompiledAssign>,
    /// Nome da regra `replace_entity`, se houver (estaticamente única)
    replace_key: Option<String>,
    /// Políticas de redução por chave, prontas para clonar por âncora
    modes: BTreeMap<String, Reduction>,
    /// Atributo usado para renderizar o texto dos valores atribuídos
    value_attr: Attr,
}

/// Uma âncora localizada, com o índice de sua fonte.
#[derive(Debug, Clone, Copy)]
struct Anchor {
    span: TokenSpan,
    source_idx: usize,
}

/// Resultado explícito da etapa de filtragem.
enum Filtered {
    Kept,
    Rejected(RejectReason),
}

/// Resultado explícito da etapa de coleta.
enum Collected {
    Kept(Vec<MatchCandidate>),
    Rejected(RejectReason),
}

/// Uma ocorrência de atribuição localizada, antes da redução.
#[derive(Debug, Clone, Copy)]
struct MatchCandidate {
    /// Span do valor (grupo de captura, ou o match completo no caso degenerado)
    value_span: TokenSpan,
    /// Span do match completo
    span: TokenSpan,
    /// Índice da regra dona na lista `assign` da fonte
    rule_idx: usize,
}

/// O matcher contextual principal.
///
/// Construído uma única vez a partir da configuração estática (que é validada e
/// compilada nesse momento); depois disso é imutável e pode ser compartilhado
/// entre threads. Todo estado por documento (cache de janelas, acumuladores)
/// vive dentro de cada chamada de processamento.
pub struct ContextualMatcher {
    label: String,
    include_assigned: bool,
    assign_as_span: bool,
    ignore_excluded: bool,
    sources: Vec<CompiledSource>,
    source_index: BTreeMap<String, usize>,
    phrase_matcher: PhraseMatcher,
    anchor_matcher: RegexMatcher,
}

impl ContextualMatcher {
    /// Compila a configuração, validando todos os invariantes estáticos.
    ///
    /// Falha rápido com [`ConfigError`] antes de qualquer documento ser
    /// processado: fonte duplicada, nome de atribuição duplicado, mais de um
    /// `replace_entity` por fonte, regex de atribuição sem exatamente um grupo
    /// de captura, janela malformada, regex inválida.
    pub fn new(config: MatcherConfig) -> Result<Self, ConfigError> {
        let mut source_index = BTreeMap::new();
        let mut phrase_matcher = PhraseMatcher::new(
            config.attr,
            config.ignore_excluded,
            config.ignore_space_tokens,
        );
        let mut anchor_matcher = RegexMatcher::new(
            config.ignore_excluded,
            config.ignore_space_tokens,
            config.alignment_mode,
        );
        let mut sources = Vec::with_capacity(config.sources.len());

        for (idx, sc) in config.sources.iter().enumerate() {
            if source_index.insert(sc.source.clone(), idx).is_some() {
                return Err(ConfigError::DuplicateSource(sc.source.clone()));
            }
            phrase_matcher.add_terms(&sc.source, &sc.terms);
            anchor_matcher.add_patterns(
                &sc.source,
                &sc.regex,
                sc.regex_attr.unwrap_or(config.attr),
                sc.regex_flags.unwrap_or(config.regex_flags),
            )?;
            sources.push(Self::compile_source(&config, sc)?);
        }

        Ok(Self {
            label: config.label,
            include_assigned: config.include_assigned,
            assign_as_span: config.assign_as_span,
            ignore_excluded: config.ignore_excluded,
            sources,
            source_index,
            phrase_matcher,
            anchor_matcher,
        })
    }

    /// Compila uma fonte: cada regra ganha seu casador próprio, construído
    /// ansiosamente com a cadeia de sobrescrita regra → fonte → motor.
    fn compile_source(
        config: &MatcherConfig,
        sc: &SourceConfig,
    ) -> Result<CompiledSource, ConfigError> {
        let constraint = |rules: &[crate::config::ConstraintRule],
                          key: &str|
         -> Result<Vec<CompiledConstraint>, ConfigError> {
            rules
                .iter()
                .map(|rule| {
                    // Restrições sempre alinham por expansão
                    let mut matcher = RegexMatcher::new(
                        config.ignore_excluded,
                        config.ignore_space_tokens,
                        AlignmentMode::Expand,
                    );
                    matcher.add_patterns(
                        key,
                        &rule.regex,
                        rule.regex_attr.or(sc.regex_attr).unwrap_or(config.attr),
                        rule.regex_flags
                            .or(sc.regex_flags)
                            .unwrap_or(config.regex_flags),
                    )?;
                    Ok(CompiledConstraint {
                        window: crate::config::normalize_window(rule.window)?,
                        limit_to_sentence: rule.limit_to_sentence,
                        matcher,
                    })
                })
                .collect()
        };

        let exclude = constraint(&sc.exclude, "exclude")?;
        let include = constraint(&sc.include, "include")?;

        let mut names = HashSet::new();
        let mut replace_key = None;
        let mut modes = BTreeMap::new();
        let mut assign = Vec::with_capacity(sc.assign.len());

        for rule in &sc.assign {
            if !names.insert(rule.name.clone()) {
                return Err(ConfigError::DuplicateAssignName {
                    source_label: sc.source.clone(),
                    name: rule.name.clone(),
                });
            }
            if rule.replace_entity {
                if replace_key.is_some() {
                    return Err(ConfigError::MultipleReplaceEntity(sc.source.clone()));
                }
                replace_key = Some(rule.name.clone());
            }
            modes.insert(rule.name.clone(), Reduction::from(rule.reduce_mode));

            let kind = match (&rule.regex, &rule.span_getter) {
                (Some(pattern), None) => {
                    let flags = rule
                        .regex_flags
                        .or(sc.regex_flags)
                        .unwrap_or(config.regex_flags);
                    let compiled = flags.compile(pattern)?;
                    let groups = compiled.captures_len() - 1;
                    if groups != 1 {
                        return Err(ConfigError::BadCaptureCount {
                            name: rule.name.clone(),
                            found: groups,
                        });
                    }
                    let mut matcher = RegexMatcher::new(
                        config.ignore_excluded,
                        config.ignore_space_tokens,
                        config.alignment_mode,
                    );
                    matcher.add_patterns(
                        &rule.name,
                        std::slice::from_ref(pattern),
                        rule.regex_attr.or(sc.regex_attr).unwrap_or(config.attr),
                        flags,
                    )?;
                    AssignKind::Regex(matcher)
                }
                (None, Some(group)) => AssignKind::SpanGroup(group.clone()),
                _ => return Err(ConfigError::AmbiguousAssignSource(rule.name.clone())),
            };

            assign.push(CompiledAssign {
                name: rule.name.clone(),
                window: crate::config::normalize_window(rule.window)?,
                limit_to_sentence: rule.limit_to_sentence,
                required: rule.required,
                replace_entity: rule.replace_entity,
                kind,
            });
        }

        Ok(CompiledSource {
            source: sc.source.clone(),
            exclude,
            include,
            assign,
            replace_key,
            modes,
            value_attr: sc.regex_attr.unwrap_or(config.attr),
        })
    }

    /// Rótulo de saída configurado.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Processa o documento de forma síncrona e retorna os spans finais.
    ///
    /// Ideal para processamento em lote ou quando não há necessidade de feedback
    /// visual.
    pub fn process(&self, doc: &Document) -> Vec<ResultSpan> {
        let (tx, rx) = mpsc::channel();
        self.process_streaming(doc, tx);
        let mut spans = Vec::new();

        // Consome todos os eventos até o fim
        while let Ok(event) = rx.recv() {
            if let MatchEvent::Done { spans: result, .. } = event {
                spans = result;
            }
        }
        spans
    }

    /// Processa documentos independentes em paralelo.
    ///
    /// O conjunto de regras compilado é imutável e compartilhado entre as
    /// threads; cada documento tem seu próprio cache de janelas.
    pub fn process_batch(&self, docs: &[Document]) -> Vec<Vec<ResultSpan>> {
        docs.par_iter().map(|doc| self.process(doc)).collect()
    }

    /// Executa o matcher enviando eventos de progresso em tempo real.
    ///
    /// # Fluxo de Eventos
    /// 1. `AnchorsFound`: âncoras descobertas.
    /// 2. `AnchorRejected` (Loop): âncoras vetadas e o motivo.
    /// 3. `AssignMatched` (Loop): valores extraídos do contexto.
    /// 4. `SpanEmitted` (Loop): cada span final.
    /// 5. `Done`: resultado consolidado.
    pub fn process_streaming(&self, doc: &Document, tx: mpsc::Sender<MatchEvent>) {
        let started = Instant::now();
        let mut cache = WindowCache::new();

        // === Passo 1: Descoberta de âncoras ===
        let anchors = self.find_anchors(doc);
        let infos: Vec<AnchorInfo> = anchors
            .iter()
            .map(|a| AnchorInfo {
                source: self.sources[a.source_idx].source.clone(),
                text: doc.original_text(&a.span),
                span: a.span,
            })
            .collect();
        let _ = tx.send(MatchEvent::AnchorsFound {
            total: infos.len(),
            anchors: infos,
        });

        let mut results = Vec::new();
        for anchor in &anchors {
            let source = &self.sources[anchor.source_idx];

            let reject = |reason: RejectReason| MatchEvent::AnchorRejected {
                source: source.source.clone(),
                text: doc.original_text(&anchor.span),
                span: anchor.span,
                reason,
            };

            // === Passo 2: Filtragem (exclusão/inclusão) ===
            match self.filter_anchor(doc, &mut cache, anchor, source) {
                Filtered::Rejected(reason) => {
                    let _ = tx.send(reject(reason));
                    continue;
                }
                Filtered::Kept => {}
            }

            // === Passo 3: Coleta de atribuições ===
            let candidates = match self.collect_assignments(doc, &mut cache, anchor, source) {
                Collected::Rejected(reason) => {
                    let _ = tx.send(reject(reason));
                    continue;
                }
                Collected::Kept(candidates) => candidates,
            };

            // === Passo 4: Redução por chave ===
            let (dict, replace_matched) = self.fold_assignments(doc, source, &candidates, &tx);

            // Fonte declara substituição, mas a regra nunca casou: descarta
            if let Some(key) = &source.replace_key {
                if !replace_matched {
                    let _ = tx.send(reject(RejectReason::ReplaceMiss { key: key.clone() }));
                    continue;
                }
            }

            // === Passo 5: Resolução (substituição ou expansão) ===
            let spans = self.resolve(doc, source, anchor, &dict);
            for span in &spans {
                let _ = tx.send(MatchEvent::SpanEmitted { span: span.clone() });
            }
            results.extend(spans);
        }

        let _ = tx.send(MatchEvent::Done {
            total_anchors: anchors.len(),
            processing_ms: started.elapsed().as_millis() as u64,
            spans: results,
        });
    }

    /// Localiza as âncoras de todas as fontes: matches de frase (em ordem de
    /// documento) seguidos dos matches de regex (fontes em ordem de
    /// configuração, matches em ordem de documento).
    fn find_anchors(&self, doc: &Document) -> Vec<Anchor> {
        let full = doc.full_span();
        let mut anchors: Vec<Anchor> = self
            .phrase_matcher
            .find(doc, &full)
            .into_iter()
            .filter_map(|(key, span)| {
                self.source_index
                    .get(&key)
                    .map(|&source_idx| Anchor { span, source_idx })
            })
            .collect();
        anchors.extend(self.anchor_matcher.find(doc, &full).into_iter().filter_map(
            |m| {
                self.source_index
                    .get(&m.key)
                    .map(|&source_idx| Anchor { span: m.span, source_idx })
            },
        ));
        anchors
    }

    /// Avalia as regras de exclusão e inclusão da fonte sobre a âncora.
    fn filter_anchor(
        &self,
        doc: &Document,
        cache: &mut WindowCache,
        anchor: &Anchor,
        source: &CompiledSource,
    ) -> Filtered {
        for rule in &source.exclude {
            let window = cache.resolve(doc, &anchor.span, rule.window, rule.limit_to_sentence);
            if rule.matcher.has_match(doc, &window) {
                return Filtered::Rejected(RejectReason::ExcludeHit);
            }
        }
        for rule in &source.include {
            let window = cache.resolve(doc, &anchor.span, rule.window, rule.limit_to_sentence);
            if !rule.matcher.has_match(doc, &window) {
                return Filtered::Rejected(RejectReason::IncludeMiss);
            }
        }
        Filtered::Kept
    }

    /// Roda cada regra de atribuição na sua janela e normaliza as ocorrências.
    fn collect_assignments(
        &self,
        doc: &Document,
        cache: &mut WindowCache,
        anchor: &Anchor,
        source: &CompiledSource,
    ) -> Collected {
        let mut candidates = Vec::new();

        for (rule_idx, rule) in source.assign.iter().enumerate() {
            let window = cache.resolve(doc, &anchor.span, rule.window, rule.limit_to_sentence);
            let found_at = candidates.len();

            match &rule.kind {
                AssignKind::Regex(matcher) => {
                    for m in matcher.find(doc, &window) {
                        candidates.push(MatchCandidate {
                            // Grupo não exercido: o valor é o match completo
                            value_span: m.group.unwrap_or(m.span),
                            span: m.span,
                            rule_idx,
                        });
                    }
                }
                AssignKind::SpanGroup(group) => {
                    for span in doc.span_group(group) {
                        if window.contains(span) {
                            candidates.push(MatchCandidate {
                                value_span: *span,
                                span: *span,
                                rule_idx,
                            });
                        }
                    }
                }
            }

            if rule.required && candidates.len() == found_at {
                return Collected::Rejected(RejectReason::RequiredMiss {
                    key: rule.name.clone(),
                });
            }
        }

        Collected::Kept(candidates)
    }

    /// Dobra as ocorrências no acumulador chaveado; retorna também se a regra
    /// `replace_entity` casou.
    fn fold_assignments(
        &self,
        doc: &Document,
        source: &CompiledSource,
        candidates: &[MatchCandidate],
        tx: &mpsc::Sender<MatchEvent>,
    ) -> (AssignDict, bool) {
        let mut dict = AssignDict::new(source.modes.clone());
        let mut replace_matched = false;

        for candidate in candidates {
            let rule = &source.assign[candidate.rule_idx];
            if rule.replace_entity {
                replace_matched = true;
            }
            let value_text =
                doc.text_of(&candidate.value_span, source.value_attr, self.ignore_excluded);
            let _ = tx.send(MatchEvent::AssignMatched {
                source: source.source.clone(),
                key: rule.name.clone(),
                text: value_text.clone(),
                span: candidate.span,
            });
            dict.insert(
                &rule.name,
                AssignRecord {
                    span: candidate.span,
                    value_span: candidate.value_span,
                    value_text,
                },
            );
        }

        (dict, replace_matched)
    }

    /// Decide os spans finais: substituição pela regra `replace_entity` ou
    /// expansão da própria âncora.
    fn resolve(
        &self,
        doc: &Document,
        source: &CompiledSource,
        anchor: &Anchor,
        dict: &AssignDict,
    ) -> Vec<ResultSpan> {
        match &source.replace_key {
            // === Substituição ===
            Some(replace_key) => {
                let mut kept = dict.spans(replace_key);

                if self.include_assigned {
                    // Candidato mais próximo da âncora (primeiro mínimo estável)
                    let mut closest_idx = 0;
                    for (i, span) in kept.iter().enumerate() {
                        if span.start.abs_diff(anchor.span.start)
                            < kept[closest_idx].start.abs_diff(anchor.span.start)
                        {
                            closest_idx = i;
                        }
                    }
                    let closest = kept[closest_idx];

                    // Funde: spans das outras chaves + âncora + candidato mais próximo
                    let mut expandables: Vec<TokenSpan> = dict
                        .iter()
                        .filter(|(key, _)| key.as_str() != replace_key.as_str())
                        .flat_map(|(_, slot)| slot.spans())
                        .collect();
                    expandables.push(anchor.span);
                    expandables.push(closest);
                    let merged = merge_spans(&expandables);

                    // Reconstrói a lista mantida sem o candidato removido
                    let mut remaining: Vec<TokenSpan> = kept
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| *i != closest_idx)
                        .map(|(_, span)| *span)
                        .collect();
                    remaining.push(merged);
                    remaining.sort_by_key(|span| span.start);
                    kept = remaining;
                }

                kept.iter()
                    .enumerate()
                    .map(|(idx, span)| {
                        self.make_result(doc, *span, source, dict, Some(replace_key.as_str()), idx)
                    })
                    .collect()
            }

            // === Expansão ===
            None => {
                let expandables: Vec<TokenSpan> =
                    dict.iter().flat_map(|(_, slot)| slot.spans()).collect();
                let span = if self.include_assigned && !expandables.is_empty() {
                    let mut all = expandables;
                    all.push(anchor.span);
                    merge_spans(&all)
                } else {
                    anchor.span
                };
                vec![self.make_result(doc, span, source, dict, None, 0)]
            }
        }
    }

    /// Monta um span de saída com seu mapa de valores atribuídos.
    ///
    /// Na substituição em política de lista, o i-ésimo span emitido recebe o
    /// i-ésimo valor da chave substituta (correspondência posicional); as demais
    /// chaves expõem o valor reduzido completo em todos os spans.
    fn make_result(
        &self,
        doc: &Document,
        span: TokenSpan,
        source: &CompiledSource,
        dict: &AssignDict,
        replace_key: Option<&str>,
        idx: usize,
    ) -> ResultSpan {
        let mut assigned = BTreeMap::new();
        for (key, slot) in dict.iter() {
            let value = match slot {
                Slot::Single(record) => self.single_value(record),
                Slot::List(records) => {
                    if replace_key == Some(key.as_str()) {
                        // Invariante da substituição: um span emitido por valor
                        match records.get(idx) {
                            Some(record) => self.single_value(record),
                            None => self.list_value(records),
                        }
                    } else {
                        self.list_value(records)
                    }
                }
            };
            assigned.insert(key.clone(), value);
        }

        let (start, end) = doc.byte_range(&span);
        ResultSpan {
            text: doc.original_text(&span),
            label: self.label.clone(),
            source: source.source.clone(),
            span,
            start,
            end,
            assigned,
        }
    }

    fn single_value(&self, record: &AssignRecord) -> AssignedValue {
        if self.assign_as_span {
            AssignedValue::Span(record.value_span)
        } else {
            AssignedValue::Text(record.value_text.clone())
        }
    }

    fn list_value(&self, records: &[AssignRecord]) -> AssignedValue {
        if self.assign_as_span {
            AssignedValue::Spans(records.iter().map(|r| r.value_span).collect())
        } else {
            AssignedValue::Texts(records.iter().map(|r| r.value_text.clone()).collect())
        }
    }
}

/// Menor span cobrindo todos os spans dados (mínimo início, máximo fim).
fn merge_spans(spans: &[TokenSpan]) -> TokenSpan {
    let start = spans.iter().map(|s| s.start).min().unwrap_or(0);
    let end = spans.iter().map(|s| s.end).max().unwrap_or(0);
    TokenSpan::new(start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AssignRule, ConstraintRule, ReduceMode, WindowSpec};
    use crate::matcher::RegexFlags;

    fn config_peso() -> MatcherConfig {
        MatcherConfig {
            label: "medida".to_string(),
            sources: vec![SourceConfig {
                source: "peso".to_string(),
                terms: vec!["pesa".to_string()],
                assign: vec![AssignRule {
                    name: "valor".to_string(),
                    regex: Some(r"(\d+)".to_string()),
                    window: Some(WindowSpec::Pair(0, 3)),
                    ..AssignRule::default()
                }],
                ..SourceConfig::default()
            }],
            attr: Attr::Norm,
            regex_flags: RegexFlags::default(),
            ignore_excluded: false,
            ignore_space_tokens: false,
            alignment_mode: AlignmentMode::Expand,
            include_assigned: false,
            assign_as_span: false,
        }
    }

    #[test]
    fn test_cenario_peso_fim_a_fim() {
        let matcher = ContextualMatcher::new(config_peso()).unwrap();
        let doc = Document::new("o paciente pesa 70 kg");
        let spans = matcher.process(&doc);

        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "pesa");
        assert_eq!(spans[0].label, "medida");
        assert_eq!(spans[0].source, "peso");
        // Política de lista: valor único vira lista de um elemento
        assert_eq!(
            spans[0].assigned.get("valor"),
            Some(&AssignedValue::Texts(vec!["70".to_string()]))
        );
    }

    #[test]
    fn test_cenario_expansao() {
        let mut config = config_peso();
        config.include_assigned = true;
        let matcher = ContextualMatcher::new(config).unwrap();
        let doc = Document::new("o paciente pesa 70 kg");
        let spans = matcher.process(&doc);

        assert_eq!(spans.len(), 1);
        // A âncora expande para cobrir o match completo da atribuição
        assert_eq!(spans[0].text, "pesa 70");
    }

    #[test]
    fn test_exclusao_veta_ancora() {
        let mut config = config_peso();
        config.sources[0].exclude = vec![ConstraintRule {
            regex: vec!["estimado".to_string()],
            window: Some(WindowSpec::Single(3)),
            ..ConstraintRule::default()
        }];
        let matcher = ContextualMatcher::new(config).unwrap();

        let doc = Document::new("o paciente pesa 70 kg estimado");
        assert!(matcher.process(&doc).is_empty());

        let doc = Document::new("o paciente pesa 70 kg");
        assert_eq!(matcher.process(&doc).len(), 1);
    }

    #[test]
    fn test_inclusao_ausente_veta_ancora() {
        let mut config = config_peso();
        // Padrões casam sobre a projeção normalizada: escritos sem acento
        config.sources[0].include = vec![ConstraintRule {
            regex: vec!["balanca".to_string()],
            window: None,
            limit_to_sentence: false,
            ..ConstraintRule::default()
        }];
        let matcher = ContextualMatcher::new(config).unwrap();

        let doc = Document::new("o paciente pesa 70 kg");
        assert!(matcher.process(&doc).is_empty());

        let doc = Document::new("na balança o paciente pesa 70 kg");
        assert_eq!(matcher.process(&doc).len(), 1);
    }

    #[test]
    fn test_exclusao_prevalece_sobre_inclusao() {
        let mut config = config_peso();
        config.sources[0].exclude = vec![ConstraintRule {
            regex: vec!["estimado".to_string()],
            window: None,
            limit_to_sentence: false,
            ..ConstraintRule::default()
        }];
        config.sources[0].include = vec![ConstraintRule {
            regex: vec!["balanca".to_string()],
            window: None,
            limit_to_sentence: false,
            ..ConstraintRule::default()
        }];
        let matcher = ContextualMatcher::new(config).unwrap();

        // Inclusão satisfeita, mas a exclusão veta mesmo assim
        let doc = Document::new("na balança o peso estimado : paciente pesa 70 kg");
        assert!(matcher.process(&doc).is_empty());
    }

    #[test]
    fn test_atribuicao_obrigatoria() {
        let mut config = config_peso();
        config.sources[0].assign[0].required = true;
        let matcher = ContextualMatcher::new(config).unwrap();

        // Sem número na janela: âncora descartada por inteiro
        let doc = Document::new("o paciente pesa pouco");
        assert!(matcher.process(&doc).is_empty());
    }

    #[test]
    fn test_substituicao_vizinho_mais_proximo() {
        let config = MatcherConfig {
            label: "medida".to_string(),
            sources: vec![SourceConfig {
                source: "pressao".to_string(),
                terms: vec!["pressão arterial".to_string()],
                assign: vec![AssignRule {
                    name: "valor".to_string(),
                    regex: Some(r"(\d+)".to_string()),
                    window: None,
                    limit_to_sentence: false,
                    replace_entity: true,
                    ..AssignRule::default()
                }],
                ..SourceConfig::default()
            }],
            attr: Attr::Norm,
            regex_flags: RegexFlags::default(),
            ignore_excluded: false,
            ignore_space_tokens: false,
            alignment_mode: AlignmentMode::Expand,
            include_assigned: true,
            assign_as_span: false,
        };
        let matcher = ContextualMatcher::new(config).unwrap();

        // Âncora em [10, 12); candidatos em [1, 2) e [9, 10)
        let doc = Document::new("no 5 w w w w w w w 8 pressão arterial fim");
        let spans = matcher.process(&doc);

        assert_eq!(spans.len(), 2);
        // O candidato distante permanece como entidade separada
        assert_eq!(spans[0].span, TokenSpan::new(1, 2));
        assert_eq!(spans[0].text, "5");
        // O mais próximo foi fundido com a âncora
        assert_eq!(spans[1].span, TokenSpan::new(9, 12));
        assert_eq!(spans[1].text, "8 pressão arterial");
        // Correspondência posicional dos valores da chave substituta
        assert_eq!(
            spans[0].assigned.get("valor"),
            Some(&AssignedValue::Text("5".to_string()))
        );
        assert_eq!(
            spans[1].assigned.get("valor"),
            Some(&AssignedValue::Text("8".to_string()))
        );
    }

    #[test]
    fn test_substituicao_sem_match_descarta() {
        let mut config = config_peso();
        config.sources[0].assign[0].replace_entity = true;
        let matcher = ContextualMatcher::new(config).unwrap();

        // A regra substituta não casa: nenhum span é emitido
        let doc = Document::new("o paciente pesa pouco");
        assert!(matcher.process(&doc).is_empty());
    }

    #[test]
    fn test_span_getter() {
        let config = MatcherConfig {
            label: "tratamento".to_string(),
            sources: vec![SourceConfig {
                source: "dose".to_string(),
                regex: vec![r"\d+ mg".to_string()],
                assign: vec![AssignRule {
                    name: "medicamento".to_string(),
                    span_getter: Some("medicamentos".to_string()),
                    window: Some(WindowSpec::Single(-4)),
                    ..AssignRule::default()
                }],
                ..SourceConfig::default()
            }],
            attr: Attr::Norm,
            regex_flags: RegexFlags::default(),
            ignore_excluded: false,
            ignore_space_tokens: false,
            alignment_mode: AlignmentMode::Expand,
            include_assigned: false,
            assign_as_span: false,
        };
        let matcher = ContextualMatcher::new(config).unwrap();

        let mut doc = Document::new("prescrita dipirona 500 mg ao dia");
        doc.add_span_group("medicamentos", vec![TokenSpan::new(1, 2)]);
        let spans = matcher.process(&doc);

        assert_eq!(spans.len(), 1);
        assert_eq!(
            spans[0].assigned.get("medicamento"),
            Some(&AssignedValue::Texts(vec!["dipirona".to_string()]))
        );
    }

    #[test]
    fn test_valores_como_spans() {
        let mut config = config_peso();
        config.assign_as_span = true;
        let matcher = ContextualMatcher::new(config).unwrap();
        let doc = Document::new("o paciente pesa 70 kg");
        let spans = matcher.process(&doc);

        assert_eq!(
            spans[0].assigned.get("valor"),
            Some(&AssignedValue::Spans(vec![TokenSpan::new(3, 4)]))
        );
    }

    #[test]
    fn test_idempotencia() {
        let matcher = ContextualMatcher::new(config_peso()).unwrap();
        let doc = Document::new("o paciente pesa 70 kg . depois pesa 72 kg .");
        let first = matcher.process(&doc);
        let second = matcher.process(&doc);
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_lote_paralelo() {
        let matcher = ContextualMatcher::new(config_peso()).unwrap();
        let docs: Vec<Document> = (0..8)
            .map(|i| Document::new(&format!("o paciente pesa {} kg", 60 + i)))
            .collect();
        let results = matcher.process_batch(&docs);
        assert_eq!(results.len(), 8);
        for (i, spans) in results.iter().enumerate() {
            assert_eq!(
                spans[0].assigned.get("valor"),
                Some(&AssignedValue::Texts(vec![format!("{}", 60 + i)]))
            );
        }
    }

    #[test]
    fn test_eventos_streaming() {
        let matcher = ContextualMatcher::new(config_peso()).unwrap();
        let doc = Document::new("o paciente pesa 70 kg");
        let (tx, rx) = mpsc::channel();
        matcher.process_streaming(&doc, tx);

        let events: Vec<MatchEvent> = rx.try_iter().collect();
        assert!(
            matches!(&events[0], MatchEvent::AnchorsFound { total: 1, .. }),
            "primeiro evento deve ser AnchorsFound"
        );
        assert!(
            matches!(events.last().unwrap(), MatchEvent::Done { .. }),
            "último evento deve ser Done"
        );
        assert!(events
            .iter()
            .any(|e| matches!(e, MatchEvent::AssignMatched { .. })));
    }

    #[test]
    fn test_config_fonte_duplicada() {
        let mut config = config_peso();
        config.sources.push(config.sources[0].clone());
        assert!(matches!(
            ContextualMatcher::new(config),
            Err(ConfigError::DuplicateSource(_))
        ));
    }

    #[test]
    fn test_config_nome_atribuicao_duplicado() {
        let mut config = config_peso();
        let rule = config.sources[0].assign[0].clone();
        config.sources[0].assign.push(rule);
        assert!(matches!(
            ContextualMatcher::new(config),
            Err(ConfigError::DuplicateAssignName { .. })
        ));
    }

    #[test]
    fn test_config_dois_replace_entity() {
        let mut config = config_peso();
        config.sources[0].assign[0].replace_entity = true;
        let mut second = config.sources[0].assign[0].clone();
        second.name = "outro".to_string();
        config.sources[0].assign.push(second);
        assert!(matches!(
            ContextualMatcher::new(config),
            Err(ConfigError::MultipleReplaceEntity(_))
        ));
    }

    #[test]
    fn test_config_grupos_de_captura() {
        // Nenhum grupo
        let mut config = config_peso();
        config.sources[0].assign[0].regex = Some(r"\d+".to_string());
        assert!(matches!(
            ContextualMatcher::new(config),
            Err(ConfigError::BadCaptureCount { found: 0, .. })
        ));

        // Dois grupos
        let mut config = config_peso();
        config.sources[0].assign[0].regex = Some(r"(\d+) (kg)".to_string());
        assert!(matches!(
            ContextualMatcher::new(config),
            Err(ConfigError::BadCaptureCount { found: 2, .. })
        ));
    }

    #[test]
    fn test_reducao_keep_last_no_motor() {
        let mut config = config_peso();
        config.sources[0].assign[0].reduce_mode = Some(ReduceMode::KeepLast);
        config.sources[0].assign[0].window = Some(WindowSpec::Single(6));
        let matcher = ContextualMatcher::new(config).unwrap();

        let doc = Document::new("o paciente pesa 70 kg ou 72 kg");
        let spans = matcher.process(&doc);
        assert_eq!(spans.len(), 1);
        // keep_last: vence a ocorrência mais à direita
        assert_eq!(
            spans[0].assigned.get("valor"),
            Some(&AssignedValue::Text("72".to_string()))
        );
    }
}
