use handlebars::{
    Context, Handlebars, Helper, HelperResult, Output, RenderContext, RenderErrorReason,
    handlebars_helper,
};
use serde_json::Value;

/// `{{toml value}}`: writes `value` as a TOML literal.
///
/// Strings come out quoted and escaped, arrays and objects as inline arrays
/// and inline tables. `null` (anywhere in the value) is an error because TOML
/// has no representation for it.
pub(crate) fn toml_literal(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let param = h
        .param(0)
        .ok_or(RenderErrorReason::ParamNotFoundForIndex("toml", 0))?;
    let literal = encode(param.value())
        .map_err(|e| RenderErrorReason::Other(format!("toml helper: {e}")))?;
    out.write(&literal)?;
    Ok(())
}

/// Encode a JSON value as an inline TOML literal.
pub(crate) fn encode(value: &Value) -> Result<String, toml::ser::Error> {
    let value = toml::Value::try_from(value)?;
    Ok(value.to_string())
}

handlebars_helper!(head: |list: array| list.first().cloned().unwrap_or(Value::Null));
handlebars_helper!(tail: |list: array| Value::Array(list.iter().skip(1).cloned().collect()));

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn roundtrip(value: Value) -> toml::Value {
        let literal = encode(&value).unwrap();
        let doc: toml::Table = toml::from_str(&format!("v = {literal}")).unwrap();
        doc["v"].clone()
    }

    #[test]
    fn strings_are_escaped() {
        let v = roundtrip(json!("say \"hi\"\nand ${NOMAD_TASK_DIR}\\x"));
        assert_eq!(v.as_str().unwrap(), "say \"hi\"\nand ${NOMAD_TASK_DIR}\\x");
    }

    #[test]
    fn nested_values_keep_shape() {
        let v = roundtrip(json!({"Username": "u", "Password": "p:w", "List": [1, 2], "On": true}));
        let t = v.as_table().unwrap();
        assert_eq!(t["Username"].as_str(), Some("u"));
        assert_eq!(t["Password"].as_str(), Some("p:w"));
        assert_eq!(t["List"].as_array().unwrap().len(), 2);
        assert_eq!(t["On"].as_bool(), Some(true));
    }

    #[test]
    fn null_is_rejected() {
        assert!(encode(&Value::Null).is_err());
        assert!(encode(&json!({"a": null})).is_err());
    }
}
