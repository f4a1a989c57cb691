use super::*;

#[test]
fn parses_recipe_text_sorted_by_layer() {
    let steps = parse_recipe("B,120:A,50: C , 200");
    assert_eq!(
        steps.iter().map(|s| s.layer).collect::<Vec<_>>(),
        vec![50, 120, 200]
    );
    assert_eq!(steps[0].material, "A");
    assert_eq!(steps[2].material, "C");
}

#[test]
fn skips_malformed_recipe_entries() {
    let steps = parse_recipe("A,10:garbage:B,x:,30:C,40");
    assert_eq!(
        steps,
        vec![
            RecipeStep {
                material: "A".into(),
                layer: 10
            },
            RecipeStep {
                material: "C".into(),
                layer: 40
            },
        ]
    );
}

#[test]
fn formats_recipe_back_to_wire_text() {
    let steps = parse_recipe("A,50:B,120");
    assert_eq!(format_recipe(&steps), "A,50:B,120");
}

#[test]
fn motor_and_direction_parse_case_insensitively() {
    assert_eq!("b".parse::<Motor>().unwrap(), Motor::B);
    assert_eq!("r".parse::<PumpDirection>().unwrap(), PumpDirection::Reverse);
    assert!("E".parse::<Motor>().is_err());
    assert_eq!(PumpId::DrainPump.motor(), Motor::D);
}
