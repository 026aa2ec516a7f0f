use cartograph_core::{Direction, EntityId, EntityKind};
use cartograph_parser::{CompileError, compile, compile_source, error::ErrorCode, parse, scan};

const TWO_ROOMS: &str = r#"
// A start room with a door to the east.
thing(start).self.kind="plot".self.name="Start".self.region="R"
thing(start).east.leadsTo="east-room"
thing("east-room").self.kind="plot".self.name="East Room".self.region="R"
    .self.locationX=1.self.locationY=0
"#;

fn code_of(err: &CompileError) -> Option<ErrorCode> {
    err.diagnostic().code()
}

#[test]
fn test_round_trip_example() {
    let recipe = compile_source(TWO_ROOMS).unwrap();

    assert_eq!(recipe.plots.len(), 2);
    assert_eq!(recipe.gates.len(), 1);

    let start = recipe.plot_by_key("start").unwrap();
    let east = recipe.plot_by_key("east-room").unwrap();
    assert_eq!((start.x, start.y), (0, 0));
    assert_eq!((east.x, east.y), (1, 0));
    assert_eq!(recipe.start_plot, Some(start.id));

    let gate = &recipe.gates[0];
    assert_eq!(gate.direction, Some(Direction::East));
    assert_eq!(gate.from_plot, Some(start.id));
    assert_eq!(gate.to_plot, Some(east.id));
}

#[test]
fn test_stages_compose() {
    let tokens = scan(TWO_ROOMS).unwrap();
    let program = parse(&tokens, TWO_ROOMS).unwrap();
    let recipe = compile(&program, TWO_ROOMS).unwrap();

    assert_eq!(recipe, compile_source(TWO_ROOMS).unwrap());
}

#[test]
fn test_compile_is_deterministic() {
    let first = compile_source(TWO_ROOMS).unwrap();
    let second = compile_source(TWO_ROOMS).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_ids_are_derived_from_normalized_keys() {
    let recipe = compile_source(r#"thing("Study Desk!!").self.name="Desk""#).unwrap();

    let plot = &recipe.plots[0];
    assert_eq!(plot.key, "study-desk");
    assert_eq!(plot.id, EntityId::derive(EntityKind::Plot, "study-desk"));
    assert_eq!(plot.name, "Desk");
}

#[test]
fn test_gate_id_uses_plot_and_fixture_key() {
    let recipe = compile_source(TWO_ROOMS).unwrap();
    assert_eq!(
        recipe.gates[0].id,
        EntityId::derive(EntityKind::Gate, "start/east")
    );
}

#[test]
fn test_duplicate_attribute_rejected() {
    let source = r#"thing(start).self.name="A".name="B""#;
    let err = compile_source(source).unwrap_err();

    assert_eq!(code_of(&err), Some(ErrorCode::E102));
    assert!(err.message().contains("`name`"));
    assert_eq!(err.line(), 1);
    assert_eq!(err.lexeme(), "name");
}

#[test]
fn test_scanner_error_position() {
    let source = "thing(a).self.name=\"A\"\nthing(b).self.name=\"unterminated";
    let err = compile_source(source).unwrap_err();

    assert_eq!(code_of(&err), Some(ErrorCode::E001));
    assert_eq!(err.line(), 2);
    assert_eq!(err.column(), 20);
    assert!(err.lexeme().starts_with('"'));
    assert_eq!(err.source_text(), source);
}

#[test]
fn test_unexpected_character() {
    let err = compile_source("thing(a).self.name=\"A\" @").unwrap_err();
    assert_eq!(code_of(&err), Some(ErrorCode::E002));
    assert_eq!(err.column(), 24);
}

#[test]
fn test_parser_error_message() {
    let err = compile_source("thing(a .self.name=\"A\"").unwrap_err();

    assert_eq!(code_of(&err), Some(ErrorCode::E100));
    assert_eq!(err.message(), "Expected ')' after declaration id");
    assert_eq!(err.line(), 1);
    assert_eq!(err.column(), 9);
}

#[test]
fn test_semantic_error_without_label_points_at_end() {
    let source = "thing(lamp).self.kind=\"item\"";
    let err = compile_source(source).unwrap_err();

    assert_eq!(code_of(&err), Some(ErrorCode::E306));
    assert_eq!(err.line(), 1);
    assert_eq!(err.column(), source.chars().count() + 1);
}

#[test]
fn test_unresolved_owner_points_at_reference() {
    let source = concat!(
        "thing(start).self.name=\"S\"\n",
        "thing(desk).self.kind=\"fixture\".self.owner=\"attic\"",
    );
    let err = compile_source(source).unwrap_err();

    assert_eq!(code_of(&err), Some(ErrorCode::E307));
    assert_eq!(err.line(), 2);
    assert_eq!(err.lexeme(), "\"attic\"");
}

#[test]
fn test_display_includes_position_and_code() {
    let err = compile_source("thing(a).self").unwrap_err();
    let rendered = err.to_string();

    assert!(rendered.starts_with("1:"));
    assert!(rendered.contains("error[E101]"));
}

#[test]
fn test_full_world() {
    let source = r#"
        thing(settings).self.kind="game".self.seed=7.self.preamble="It begins."
        thing(hall).self.name="Hall".self.start=true.self.contains=["lamp"]
            .north.leadsTo="library".north.keyExpression="has(brass-key)"
            .desk.name="Desk".desk.contains=["letter"]
        thing(library).self.name="Library"
            .south.leadsTo="hall".south.visible=false
        thing(limbo).self.abstract=true
        thing(lamp).self.kind="item".self.footprint=2
        thing(letter).self.kind="item"
        thing(satchel).self.kind="item".self.capacity=3.self.owner="hero"
        actor(hero).self.player=true.self.owner="hall".self.skills=["read"]
    "#;
    let recipe = compile_source(source).unwrap();

    assert_eq!(recipe.seed, 7);
    assert_eq!(recipe.plots.len(), 3);
    assert_eq!(recipe.gates.len(), 2);
    assert_eq!(recipe.fixtures.len(), 1);
    assert_eq!(recipe.items.len(), 3);
    assert_eq!(recipe.actors.len(), 1);

    let hall = recipe.plot_by_key("hall").unwrap();
    assert_eq!(recipe.start_plot, Some(hall.id));

    let north = recipe.gates.iter().find(|gate| gate.key == "hall/north").unwrap();
    assert_eq!(north.key_expression.as_deref(), Some("has(brass-key)"));
    let south = recipe.gates.iter().find(|gate| gate.key == "library/south").unwrap();
    assert!(!south.visible);

    let desk = &recipe.fixtures[0];
    let letter = recipe.items.iter().find(|item| item.key == "letter").unwrap();
    assert_eq!(letter.owner, Some(desk.id));

    let satchel = recipe.items.iter().find(|item| item.key == "satchel").unwrap();
    assert_eq!(satchel.owner, Some(recipe.actors[0].id));
}
