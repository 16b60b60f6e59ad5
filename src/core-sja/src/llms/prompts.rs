use std::collections::HashMap;

use crate::Error;
use indoc::indoc;
use subst::substitute;

const ANALYZE_SCRIPT: &str = indoc! { "
  Answer the user's question as best as possible.
  ${FORMAT_INSTRUCTIONS}

  Please tell the programming language of the script in one word.
  Please tell the modules and packages used in the script in single words.
  Please tell the techniques used in the script in single words.
  Please tell the summary of the script.
  Please return the result in JSON.

  <script>
  ${SCRIPT}
  </script>
"};

/// The analysis prompt: the question, the output format, then the batch script verbatim.
pub fn prompt_analyze_script(format_instructions: &str, script: &str) -> Result<String, Error> {
    let res = substitute(ANALYZE_SCRIPT, &{
        let mut v = HashMap::new();
        v.insert("FORMAT_INSTRUCTIONS".to_string(), format_instructions.to_string());
        v.insert("SCRIPT".to_string(), script.to_string());
        v
    })?;
    Ok(res)
}

const REPAIR_OUTPUT: &str = indoc! { "
  Instructions:
  <instructions>
  ${FORMAT_INSTRUCTIONS}
  </instructions>

  Completion:
  <completion>
  ${COMPLETION}
  </completion>

  Above, the Completion did not satisfy the constraints given in the Instructions.
  Error:
  <error>
  ${ERROR}
  </error>

  Please try again. Please only respond with an answer that satisfies the constraints laid out in the Instructions.
"};

/// Asks a model to rewrite a completion that failed to parse so it conforms to the format.
pub fn prompt_repair_output(format_instructions: &str, completion: &str, error: &str) -> Result<String, Error> {
    let res = substitute(REPAIR_OUTPUT, &{
        let mut v = HashMap::new();
        v.insert("FORMAT_INSTRUCTIONS".to_string(), format_instructions.to_string());
        v.insert("COMPLETION".to_string(), completion.to_string());
        v.insert("ERROR".to_string(), error.to_string());
        v
    })?;
    Ok(res)
}
